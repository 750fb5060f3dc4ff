#![deny(unsafe_code)]

//! `spark-link`：可组合的请求/响应中间件链路。
//!
//! # 教案式说明
//! - **意图（Why）**：把“鉴权、追踪、改写变量、选择传输”等横切逻辑拆成独立的 Link，彼此以续延串接，
//!   任何一个 Link 都可以直接产出结果流，也可以修改操作后交给下一个 Link。
//! - **逻辑（How）**：
//!   - [`link`]：对象变体 [`Link`] 与函数变体 [`FunctionLink`]，统一于 [`LinkUnit`]；
//!   - [`compose`]：`concat`/`split`/`when`/`from`/`empty`，纯同步装配；
//!   - [`execute`]：规范化请求并驱动链路，返回 [`ResultStream`]；
//!   - [`diagnostics`]：构造期的终止单元告警与可注入的诊断输出。
//! - **契约（What）**：装配从不修改已有单元；结果流的取消即 `Drop`；构造期错误同步返回，
//!   流级错误作为流中的 `Err` 元素传播后流即结束。
//! - **风险与权衡（Trade-offs）**：终止判断基于单元声明的形状而非运行期行为，属于尽力而为的静态检查。

pub mod compose;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod execute;
pub mod link;
pub mod operation;
pub mod registry;
pub mod stream;

pub use compose::{concat, empty, from, split, when};
pub use config::{ExecutionConfig, LinkConfig, PipelineConfig, RequestValidation};
pub use context::{Context, ContextMap};
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, SilentSink, TracingSink};
pub use document::Document;
pub use error::{LinkError, Result};
pub use execute::{Executor, execute};
pub use link::{Forward, FunctionLink, Link, LinkOutcome, LinkUnit, RequestHandler};
pub use operation::{Operation, Request};
pub use registry::LinkRegistry;
pub use stream::{Emitter, FetchResult, ResultStream, StreamItem};

/// 常用类型的一站式导入。
pub mod prelude {
    pub use crate::{
        FetchResult, Forward, FunctionLink, Link, LinkError, LinkOutcome, LinkUnit, Operation,
        Request, RequestHandler, ResultStream, concat, empty, execute, from, split, when,
    };
}
