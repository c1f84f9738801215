//! Tool-listing rendering: markdown with ready-to-paste `call-tool`
//! examples, grounded in the original `cmd_list_tools` /
//! `generate_json_example` pair.

use serde_json::Value;

/// Build a placeholder value for one JSON-schema property, based on
/// its declared `type`.
fn generate_placeholder(prop_info: &Value) -> Value {
    match prop_info.get("type").and_then(Value::as_str) {
        Some("number") => Value::String("<number>".to_string()),
        Some("integer") => Value::String("<integer>".to_string()),
        Some("boolean") => Value::Bool(true),
        Some("array") => {
            let item = prop_info
                .get("items")
                .map(generate_placeholder)
                .unwrap_or_else(|| Value::String("<string>".to_string()));
            Value::Array(vec![item.clone(), item])
        },
        Some("object") => {
            let Some(nested) = prop_info.get("properties").and_then(Value::as_object) else {
                let mut fallback = serde_json::Map::new();
                fallback.insert("<string>".to_string(), Value::String("<string>".to_string()));
                return Value::Object(fallback);
            };
            let mut out = serde_json::Map::new();
            for (key, val) in nested {
                out.insert(key.clone(), generate_placeholder(val));
            }
            Value::Object(out)
        },
        Some(other) => Value::String(format!("<{other}>")),
        None => Value::String("<string>".to_string()),
    }
}

/// Build a JSON example object with type-based placeholders from a
/// tool's `inputSchema`. Returns an empty object if the schema has no
/// properties (the tool takes no parameters).
#[must_use]
pub fn build_example_json(schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(serde_json::Map::new());
    };

    let mut example = serde_json::Map::new();
    for (name, prop_info) in properties {
        example.insert(name.clone(), generate_placeholder(prop_info));
    }
    Value::Object(example)
}

/// Render a tool listing as markdown, with one `## name` section per
/// tool and a ready-to-paste `call-tool` example underneath (mirrors
/// the original's non-JSON `cmd_list_tools` branch).
#[must_use]
pub fn render_markdown(server_ref: &str, tools: &[Value]) -> String {
    let mut out = format!("# Available tools from: {server_ref}\n\n");

    for tool in tools {
        let name = tool.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
        out.push_str(&format!("## {name}\n\n"));

        if let Some(description) = tool.get("description").and_then(Value::as_str) {
            out.push_str(description);
            out.push_str("\n\n");
        }

        let schema = tool.get("inputSchema").cloned().unwrap_or(Value::Null);
        let example = build_example_json(&schema);

        out.push_str("### Example\n\n```bash\n");
        let example_json = serde_json::to_string(&example).unwrap_or_else(|_| "{}".to_string());
        out.push_str(&format!("mcp-cli call-tool {server_ref} {name} '{example_json}'\n"));
        out.push_str("```\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_handles_scalar_types() {
        assert_eq!(
            generate_placeholder(&serde_json::json!({"type": "number"})),
            Value::String("<number>".to_string())
        );
        assert_eq!(generate_placeholder(&serde_json::json!({"type": "boolean"})), Value::Bool(true));
    }

    #[test]
    fn build_example_json_empty_schema_yields_empty_object() {
        let example = build_example_json(&Value::Null);
        assert_eq!(example, Value::Object(serde_json::Map::new()));
    }

    #[test]
    fn build_example_json_fills_in_properties() {
        let schema = serde_json::json!({
            "properties": {
                "path": {"type": "string"},
                "recursive": {"type": "boolean"},
            }
        });
        let example = build_example_json(&schema);
        assert_eq!(example["path"], Value::String("<string>".to_string()));
        assert_eq!(example["recursive"], Value::Bool(true));
    }

    #[test]
    fn render_markdown_includes_tool_name_and_example() {
        let tools = vec![serde_json::json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": {"properties": {"path": {"type": "string"}}}
        })];
        let rendered = render_markdown("filesystem", &tools);
        assert!(rendered.contains("## read_file"));
        assert!(rendered.contains("mcp-cli call-tool filesystem read_file"));
    }
}
