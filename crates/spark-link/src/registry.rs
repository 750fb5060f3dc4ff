//! 命名单元注册表，支持按配置装配链路。
//!
//! # 教案式说明
//! - **意图（Why）**：部署侧常以名称列表描述链路（见 [`PipelineConfig`]），需要一个从名称到单元工厂的映射，
//!   并在装配期而非执行期发现引用错误。
//! - **逻辑（How）**：每个名称绑定一个工厂，[`LinkRegistry::build`] 依次取工厂产物，再按 [`compose::from`]
//!   的语义折叠。
//! - **契约（What）**：任一名称未注册即返回 [`LinkError::UnknownLink`]，此时不会产生任何诊断；
//!   重复注册同名工厂时后注册者覆盖先注册者。

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    compose,
    config::PipelineConfig,
    error::{LinkError, Result},
    link::{Link, LinkUnit},
};

type LinkFactory = dyn Fn() -> LinkUnit + Send + Sync;

/// 名称到单元工厂的映射。
#[derive(Clone, Default)]
pub struct LinkRegistry {
    factories: BTreeMap<String, Arc<LinkFactory>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂；返回是否覆盖了已有条目。
    pub fn register<F, U>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> U + Send + Sync + 'static,
        U: Into<LinkUnit>,
    {
        let name = name.into();
        let replaced = self
            .factories
            .insert(name.clone(), Arc::new(move || -> LinkUnit { factory().into() }))
            .is_some();
        if replaced {
            tracing::debug!(link = %name, "replacing registered link factory");
        }
        replaced
    }

    /// 注册一个现成的单元，每次装配都复用它的克隆。
    pub fn register_link(&mut self, name: impl Into<String>, link: Link) -> bool {
        self.register(name, move || link.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// 按名称顺序装配链路。
    pub fn build<I, S>(&self, names: I) -> Result<Link>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let units = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.factories
                    .get(name)
                    .map(|factory| factory())
                    .ok_or_else(|| LinkError::UnknownLink {
                        name: name.to_owned(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(compose::from(units))
    }

    /// 按配置装配链路。
    pub fn build_pipeline(&self, config: &PipelineConfig) -> Result<Link> {
        self.build(&config.links)
    }
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("links", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{self, RecordingSink},
        execute::execute,
        operation::Request,
        stream::{FetchResult, ResultStream},
    };
    use futures::executor::block_on;
    use serde_json::json;

    fn registry() -> LinkRegistry {
        let mut registry = LinkRegistry::new();
        registry.register("tag", || {
            Link::forwarding(|op, forward| {
                op.set_context(json!({ "tagged": true }).as_object().cloned().unwrap_or_default());
                match forward {
                    Some(forward) => forward.call(op).map(Some),
                    None => Ok(None),
                }
            })
        });
        registry.register("terminal", || {
            Link::terminating(|op| {
                let tagged = op.get_context().get("tagged").cloned();
                Ok(Some(ResultStream::once(FetchResult::data(json!({ "tagged": tagged })))))
            })
        });
        registry
    }

    #[test]
    fn builds_links_in_configured_order() {
        let link = registry()
            .build_pipeline(&PipelineConfig {
                links: vec!["tag".to_owned(), "terminal".to_owned()],
            })
            .expect("所有名称均已注册");
        assert!(link.is_terminating());

        let first = block_on(
            execute(link, Request::new("{ a }"))
                .expect("执行")
                .into_first(),
        )
        .expect("无流错误");
        assert_eq!(first, Some(FetchResult::data(json!({ "tagged": true }))));
    }

    #[test]
    fn unknown_names_fail_before_any_composition() {
        let sink = RecordingSink::new();
        let _guard = diagnostics::scoped(sink.clone());

        let err = registry()
            .build(["terminal", "tag", "missing"])
            .expect_err("未注册名称应失败");

        assert!(matches!(err, LinkError::UnknownLink { ref name } if name == "missing"));
        assert!(err.is_configuration());
        assert!(sink.is_empty(), "失败的装配不应发出组合诊断");
    }

    #[test]
    fn later_registrations_replace_earlier_ones() {
        let mut registry = registry();
        assert!(registry.register_link("terminal", compose::empty()));
        assert!(!registry.register_link("fresh", compose::empty()));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["fresh", "tag", "terminal"]);
    }
}
