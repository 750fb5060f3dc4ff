//! 执行引擎：把原始请求与组合好的单元变成结果流。
//!
//! # 教案式说明
//! - **意图（Why）**：调用方只关心“提交请求、拿到流”；校验、规范化与空值兜底集中在此完成，
//!   调用方无需对返回值做空判断。
//! - **逻辑（How）**：
//!   1. 文档缺失或形态无法识别时发出诊断，但继续执行；
//!   2. [`Operation::from_request`] 完成规范化；
//!   3. 以无续延的方式调用单元；
//!   4. 单元返回 `None` 时以空流兜底。
//! - **契约（What）**：单元同步返回的错误原样传播；所有校验与 Handler 调用都在 `execute` 返回前同步完成，
//!   结果的产出取决于叶子单元返回的流。

use serde_json::Value;

use crate::{
    config::ExecutionConfig,
    diagnostics::{self, Diagnostic},
    error::Result,
    link::LinkUnit,
    operation::{Operation, Request},
    stream::ResultStream,
};

/// 以默认配置执行。
pub fn execute(unit: impl Into<LinkUnit>, request: Request) -> Result<ResultStream> {
    Executor::default().execute(unit, request)
}

/// 携带配置的执行引擎。
#[derive(Clone, Debug, Default)]
pub struct Executor {
    config: ExecutionConfig,
}

impl Executor {
    pub fn with_config(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// 执行一个请求。
    pub fn execute(&self, unit: impl Into<LinkUnit>, request: Request) -> Result<ResultStream> {
        let unit = unit.into();
        let recognized = request
            .query
            .as_ref()
            .is_some_and(|query| query.is_recognized());
        if !recognized && self.config.warn_on_unrecognized_document {
            diagnostics::emit(Diagnostic::UnrecognizedDocument);
        }

        let operation = Operation::from_request(request);
        tracing::trace!(
            operation = operation.operation_name().unwrap_or("anonymous"),
            terminating = unit.is_terminating(),
            "executing operation"
        );
        Ok(unit
            .handle(operation, None)?
            .unwrap_or_else(ResultStream::empty))
    }

    /// 执行一个松散的 JSON 请求，按配置校验其键集合。
    pub fn execute_value(&self, unit: impl Into<LinkUnit>, raw: Value) -> Result<ResultStream> {
        let request = Request::from_value_with(raw, self.config.request_validation)?;
        self.execute(unit, request)
    }
}
