//! 原始请求 [`Request`] 与规范化后的 [`Operation`]。
//!
//! # 教案式说明
//! - **意图（Why）**：调用方提交的请求是松散的（字段可缺省、可能来自 JSON），而链路中的每个 Link 需要
//!   一个字段齐全的记录；规范化在 [`Operation::from_request`] 中一次完成。
//! - **逻辑（How）**：缺省的 `variables`/`extensions` 填充为空映射；未显式给出的操作名从文档推导；
//!   上下文由 [`Context`] 句柄承载，不作为普通字段暴露。
//! - **契约（What）**：`with_*` 系列方法返回覆盖了某个字段的新 Operation，新值与原值共享同一上下文，
//!   对应“展开原操作并覆盖字段后转发”的写法。

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::{
    config::RequestValidation,
    context::{Context, ContextMap},
    document::Document,
    error::{LinkError, Result},
};

/// 原始请求中允许出现的键。
pub const REQUEST_KEYS: [&str; 5] = [
    "query",
    "operationName",
    "variables",
    "extensions",
    "context",
];

/// 调用方提交的原始请求。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub query: Option<Document>,
    pub variables: Option<Map<String, Value>>,
    pub operation_name: Option<String>,
    pub extensions: Option<Map<String, Value>>,
    pub context: Option<ContextMap>,
}

impl Request {
    pub fn new(query: impl Into<Document>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Map<String, Value>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = Some(context);
        self
    }

    /// 以严格模式从 JSON 对象构造请求，见 [`Request::from_value_with`]。
    pub fn from_value(raw: Value) -> Result<Self> {
        Self::from_value_with(raw, RequestValidation::Strict)
    }

    /// 从 JSON 对象构造请求。
    ///
    /// # 契约说明（What）
    /// - 只接受 [`REQUEST_KEYS`] 中的键；严格模式下遇到其他键返回 [`LinkError::InvalidRequest`]，
    ///   宽松模式下丢弃并记录 `debug` 日志；
    /// - `variables`/`extensions`/`context` 必须是对象或 `null`，`operationName` 必须是字符串或 `null`，
    ///   否则返回 [`LinkError::MalformedRequest`]；
    /// - `query` 原样保留，形态校验推迟到执行阶段，以诊断而非错误的方式处理。
    pub fn from_value_with(raw: Value, validation: RequestValidation) -> Result<Self> {
        let Value::Object(fields) = raw else {
            return Err(LinkError::MalformedRequest {
                detail: "request must be a JSON object".to_owned(),
            });
        };

        let mut request = Request::default();
        for (key, value) in fields {
            match key.as_str() {
                "query" => request.query = Some(Document::from(value)),
                "operationName" => request.operation_name = optional_string(&key, value)?,
                "variables" => request.variables = optional_object(&key, value)?,
                "extensions" => request.extensions = optional_object(&key, value)?,
                "context" => request.context = optional_object(&key, value)?,
                _ => match validation {
                    RequestValidation::Strict => return Err(LinkError::InvalidRequest { key }),
                    RequestValidation::Lenient => {
                        tracing::debug!(key = %key, "dropping unknown request key");
                    }
                },
            }
        }
        Ok(request)
    }
}

fn optional_object(key: &str, value: Value) -> Result<Option<Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(LinkError::MalformedRequest {
            detail: format!("`{key}` must be an object, got {other}"),
        }),
    }
}

fn optional_string(key: &str, value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(name) => Ok(Some(name)),
        other => Err(LinkError::MalformedRequest {
            detail: format!("`{key}` must be a string, got {other}"),
        }),
    }
}

/// 规范化后在链路中流转的操作。
#[derive(Clone, Debug)]
pub struct Operation {
    query: Document,
    variables: Map<String, Value>,
    operation_name: Option<String>,
    extensions: Map<String, Value>,
    context: Context,
}

impl Operation {
    /// 规范化原始请求。
    pub fn from_request(request: Request) -> Self {
        let Request {
            query,
            variables,
            operation_name,
            extensions,
            context,
        } = request;
        let query = query.unwrap_or_default();
        let operation_name =
            operation_name.or_else(|| query.operation_name().map(ToOwned::to_owned));
        Self {
            query,
            variables: variables.unwrap_or_default(),
            operation_name,
            extensions: extensions.unwrap_or_default(),
            context: context.map(Context::seeded).unwrap_or_default(),
        }
    }

    pub fn query(&self) -> &Document {
        &self.query
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// 上下文快照。
    pub fn get_context(&self) -> ContextMap {
        self.context.get()
    }

    /// 浅合并一段上下文。
    pub fn set_context(&self, partial: ContextMap) {
        self.context.merge(partial);
    }

    /// 以当前上下文计算增量后浅合并。
    pub fn update_context<F>(&self, derive: F)
    where
        F: FnOnce(&ContextMap) -> ContextMap,
    {
        self.context.update(derive);
    }

    /// 上下文是否已暴露为可枚举字段。
    pub fn has_context(&self) -> bool {
        self.context.is_exposed()
    }

    /// 两个操作是否共享同一上下文。
    pub fn shares_context_with(&self, other: &Operation) -> bool {
        self.context.ptr_eq(&other.context)
    }

    pub fn with_query(mut self, query: impl Into<Document>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Map<String, Value>) -> Self {
        self.extensions = extensions;
        self
    }

    /// 稳定缓存键：`<文档>|<变量 JSON>|<操作名>`。
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.query.key_fragment(),
            Value::Object(self.variables.clone()),
            self.operation_name.as_deref().unwrap_or_default()
        )
    }
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let exposed = self.context.is_exposed();
        let len = 3 + usize::from(self.operation_name.is_some()) + usize::from(exposed);
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("query", &self.query)?;
        map.serialize_entry("variables", &self.variables)?;
        if let Some(name) = &self.operation_name {
            map.serialize_entry("operationName", name)?;
        }
        map.serialize_entry("extensions", &self.extensions)?;
        if exposed {
            map.serialize_entry("context", &self.context.get())?;
        }
        map.end()
    }
}
