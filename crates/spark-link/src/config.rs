//! 执行与链路装配配置。
//!
//! # 教案式说明
//! - **意图（Why）**：请求校验的严格程度、是否对无法识别的文档告警、链路由哪些已注册单元组成，
//!   这些差异随部署环境变化，应外部化为配置而不是散落在代码里。
//! - **结构（How）**：[`LinkConfig`] 由 `[execution]` 与 `[pipeline]` 两张表组成，字段全部带默认值，
//!   可由 TOML 文本经 [`LinkConfig::from_toml_str`] 加载。
//! - **契约（What）**：未知字段被拒绝，避免拼写错误静默生效。

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 原始请求中出现未知键时的处理方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestValidation {
    /// 返回 `illegal argument` 错误。
    #[default]
    Strict,
    /// 丢弃未知键并记录 `debug` 日志。
    Lenient,
}

/// 执行引擎配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub request_validation: RequestValidation,
    /// 文档缺失或形态无法识别时是否发出诊断。
    pub warn_on_unrecognized_document: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            request_validation: RequestValidation::Strict,
            warn_on_unrecognized_document: true,
        }
    }
}

/// 链路装配配置：按顺序列出注册表中的单元名称。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub links: Vec<String>,
}

/// 顶层配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub execution: ExecutionConfig,
    pub pipeline: PipelineConfig,
}

impl LinkConfig {
    /// 从 TOML 文本加载。
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}
