//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为链路构造、请求规范化与结果流失败提供统一的错误域 [`LinkError`]；
//! - 将“构造期致命错误”与“流内可恢复错误”区分开，前者同步返回，后者作为流中的 `Err` 元素传播。
//!
//! ## 设计要求（What）
//! - 所有变体派生 [`thiserror::Error`]，以兼容 `std::error::Error` 与 `?` 传播；
//! - 每个变体都暴露稳定错误码 [`LinkError::code`]，命名遵循 `link.<类别>.<细项>`。

use std::{borrow::Cow, error::Error as StdError};

use thiserror::Error;

/// 本 crate 统一使用的结果别名。
pub type Result<T, E = LinkError> = core::result::Result<T, E>;

/// 链路错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：Link 的失败分为三类：构造/配置错误（同步、致命）、请求规范化错误（同步、致命）
///   以及流级错误（异步、只影响当前执行）；统一枚举便于调用方按类别做决策。
/// - **契约 (What)**：
///   - `MissingForward`、`UnknownLink`、`Config` 属于配置错误，[`LinkError::is_configuration`] 返回 `true`；
///   - `InvalidRequest`、`MalformedRequest` 在规范化请求时同步返回；
///   - `Failed`、`Source` 由 Handler 通过结果流的错误通道发出，流随即结束。
/// - **设计权衡 (Trade-offs)**：流级错误使用 `Box<dyn Error>` 承载外部来源，牺牲 `Clone` 换取对任意
///   传输层错误的零适配接入。
#[derive(Debug, Error)]
pub enum LinkError {
    /// 非终止 Link 位于链路末尾，却尝试向下一个 Link 转发。
    #[error("request is not implemented: link `{link}` has no next link to forward to")]
    MissingForward { link: Cow<'static, str> },

    /// 注册表中不存在配置所引用的 Link 名称。
    #[error("unknown link `{name}` referenced by pipeline configuration")]
    UnknownLink { name: String },

    /// 配置文本无法解析。
    #[error("invalid link configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// 原始请求包含不被允许的字段。
    #[error("illegal argument: {key}")]
    InvalidRequest { key: String },

    /// 原始请求结构不合法，例如不是对象或字段类型错误。
    #[error("malformed request: {detail}")]
    MalformedRequest { detail: String },

    /// Handler 主动声明的流级失败。
    #[error("link failed: {detail}")]
    Failed { detail: String },

    /// 外部来源（传输层、编解码层等）引发的流级失败。
    #[error("link failed: {source}")]
    Source {
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl LinkError {
    /// 构造“缺少转发目标”的配置错误，`link` 为触发方的可读名称。
    pub fn missing_forward(link: impl Into<Cow<'static, str>>) -> Self {
        Self::MissingForward { link: link.into() }
    }

    /// 构造流级失败。
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }

    /// 包装外部错误为流级失败。
    pub fn from_source<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Source {
            source: Box::new(source),
        }
    }

    /// 返回稳定的错误码，供日志与告警聚合使用。
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::MissingForward { .. } => "link.configuration.missing_forward",
            LinkError::UnknownLink { .. } => "link.configuration.unknown_link",
            LinkError::Config(_) => "link.configuration.invalid",
            LinkError::InvalidRequest { .. } => "link.request.illegal_argument",
            LinkError::MalformedRequest { .. } => "link.request.malformed",
            LinkError::Failed { .. } => "link.stream.failed",
            LinkError::Source { .. } => "link.stream.source",
        }
    }

    /// 是否属于构造/配置类错误。
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LinkError::MissingForward { .. } | LinkError::UnknownLink { .. } | LinkError::Config(_)
        )
    }
}
