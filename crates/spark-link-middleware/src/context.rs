//! 上下文注入阶段。

use std::{borrow::Cow, sync::Arc};

use spark_link::{ContextMap, Forward, Link, LinkError, LinkOutcome, Operation, RequestHandler};

type ContextFn = dyn Fn(&Operation) -> ContextMap + Send + Sync;

/// 由操作计算出一份局部上下文，浅合并进操作后转发。
///
/// # 契约说明（What）
/// - 合并发生在转发之前，下游单元可见；
/// - 返回空映射时上下文内容不变，但上下文被标记为已暴露。
#[derive(Clone)]
pub struct ContextLink {
    derive: Arc<ContextFn>,
}

impl ContextLink {
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn(&Operation) -> ContextMap + Send + Sync + 'static,
    {
        Self {
            derive: Arc::new(derive),
        }
    }
}

impl RequestHandler for ContextLink {
    fn request(&self, operation: Operation, forward: Option<Forward>) -> LinkOutcome {
        let forward = forward.ok_or_else(|| LinkError::missing_forward(self.name()))?;
        let partial = (self.derive)(&operation);
        operation.set_context(partial);
        forward.call(operation).map(Some)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("context")
    }
}

/// 以闭包构造上下文注入阶段。
pub fn set_context<F>(derive: F) -> Link
where
    F: Fn(&Operation) -> ContextMap + Send + Sync + 'static,
{
    Link::new(ContextLink::new(derive))
}
