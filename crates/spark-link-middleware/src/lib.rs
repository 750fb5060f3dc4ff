//! spark-link-middleware: 构建在 `spark-link` 之上的可复用 Link 组件库。
//!
//! # 教案式概览
//! - **意图（Why）**：上下文注入、结构化日志、结果改写是几乎每条链路都会用到的阶段，集中实现以免
//!   各业务重复编写转发样板代码。
//! - **结构（How）**：按关注点拆分为 [`context`]、[`logging`] 与 [`map`] 三个模块，每个组件都实现
//!   [`spark_link::RequestHandler`]，可经 `Link::new` 或各自的便捷函数接入链路。
//! - **契约（What）**：三个组件都是转发型阶段，位于链路末尾时返回
//!   [`LinkError::MissingForward`](spark_link::LinkError::MissingForward)。
//! - **风险提示（Trade-offs）**：组件不做重试与缓存，失败语义完全沿用下游单元。

pub mod context;
pub mod logging;
pub mod map;

pub use context::{ContextLink, set_context};
pub use logging::{LoggingLink, LoggingLinkConfig};
pub use map::{MapResultLink, map_results};
