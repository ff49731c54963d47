use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool definition exposed to the caller over `tools/list`.
///
/// `name` is already namespaced (`backend/local-name`) by the time this
/// reaches the wire, except for virtual tools, which keep their literal
/// `portero/...` name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments. Opaque to the core.
    #[serde(default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Builds the `{ content: [{ type: "text", text }] }` envelope used for
/// every `tools/call` reply, virtual or backend-dispatched.
pub fn text_content(text: impl Into<String>) -> Value {
    serde_json::json!({
        "content": [
            { "type": "text", "text": text.into() }
        ]
    })
}

/// Same as [`text_content`] but marks the reply as an error result.
pub fn error_content(text: impl Into<String>) -> Value {
    serde_json::json!({
        "content": [
            { "type": "text", "text": text.into() }
        ],
        "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_shape() {
        let v = text_content("hello");
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][0]["text"], "hello");
        assert!(v.get("isError").is_none());
    }

    #[test]
    fn error_content_sets_flag() {
        let v = error_content("boom");
        assert_eq!(v["isError"], true);
    }

    #[test]
    fn tool_definition_default_schema_is_empty_object() {
        let raw = r#"{"name":"x/y","description":"d"}"#;
        let def: ToolDefinition = serde_json::from_str(raw).unwrap();
        assert_eq!(def.input_schema["type"], "object");
    }
}
