//! 请求文档的不透明包装。
//!
//! 链路层不解析文档，只需要两件事：判断形态是否可识别，以及在 AST 形态下推导操作名。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 请求文档。
///
/// 可识别的形态有两种：源文本（JSON 字符串）与已解析的 AST（`kind` 为 `"Document"` 的对象）。
/// 其余形态照样可以被携带，只是 [`Document::is_recognized`] 返回 `false`。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    /// 以源文本构造文档。
    pub fn text(source: impl Into<String>) -> Self {
        Self(Value::String(source.into()))
    }

    /// 以已解析的 AST 构造文档，调用方负责 AST 结构。
    pub fn ast(ast: Value) -> Self {
        Self(ast)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// 文档是否为源文本形态。
    pub fn as_text(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// 文档形态是否可识别。
    pub fn is_recognized(&self) -> bool {
        match &self.0 {
            Value::String(_) => true,
            Value::Object(map) => map.get("kind").and_then(Value::as_str) == Some("Document"),
            _ => false,
        }
    }

    /// 从 AST 形态推导操作名：取第一个带名称的 `OperationDefinition`。
    ///
    /// 源文本形态不做解析，恒返回 `None`。
    pub fn operation_name(&self) -> Option<&str> {
        let definitions = self.0.get("definitions")?.as_array()?;
        definitions
            .iter()
            .filter(|definition| {
                definition.get("kind").and_then(Value::as_str) == Some("OperationDefinition")
            })
            .find_map(|definition| definition.get("name")?.get("value")?.as_str())
    }

    /// 缓存键中使用的文档片段：源文本原样输出，其余形态输出紧凑 JSON。
    pub fn key_fragment(&self) -> String {
        match &self.0 {
            Value::String(source) => source.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for Document {
    fn from(source: &str) -> Self {
        Self::text(source)
    }
}

impl From<String> for Document {
    fn from(source: String) -> Self {
        Self::text(source)
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
