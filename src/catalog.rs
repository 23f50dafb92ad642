use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{Result, validation};

/// Externally invocable tool: a description plus the parameter schema shown
/// by `--describe`. The "required" flag is advisory metadata for schema
/// consumers; generic handlers do not enforce it.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub params: Vec<ToolParam>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolParam {
    pub name: String,
    /// Free-form type label (int, bool, str, float, list, object).
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

static CATALOG: Lazy<Vec<ToolSpec>> = Lazy::new(|| {
    let raw = include_str!("../schemas/tools.json");
    serde_json::from_str(raw).expect("invalid tools.json")
});

/// All tools in declaration order (grouped by resource).
pub fn tools() -> &'static [ToolSpec] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    CATALOG.iter().find(|tool| tool.name == name)
}

/// Enumeration view: `[{name, description}, ...]`.
pub fn list_tools() -> Value {
    let entries: Vec<Value> = CATALOG
        .iter()
        .map(|tool| json!({"name": tool.name, "description": tool.description}))
        .collect();
    Value::Array(entries)
}

/// Schema view for one tool: an object-type input schema with per-parameter
/// type/description/default and the advisory required-list.
pub fn describe_tool(name: &str) -> Result<Value> {
    let tool = find(name).ok_or_else(|| validation(format!("Tool not found: {name}")))?;

    let mut properties = Map::new();
    for param in &tool.params {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(param.kind.clone()));
        prop.insert("description".into(), Value::String(param.description.clone()));
        if let Some(default) = &param.default {
            prop.insert("default".into(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(prop));
    }
    let required: Vec<Value> = tool
        .params
        .iter()
        .filter(|param| param.required)
        .map(|param| Value::String(param.name.clone()))
        .collect();

    Ok(json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": {
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn list_view_carries_name_and_description_for_every_tool() {
        let listed = list_tools();
        let entries = listed.as_array().unwrap();
        assert_eq!(entries.len(), tools().len());
        let first = &entries[0];
        assert_eq!(first["name"], "project_list");
        assert_eq!(first["description"], "List projects");
    }

    #[test]
    fn describe_habit_create_requires_exactly_title() {
        let schema = describe_tool("habit_create").unwrap();
        assert_eq!(schema["inputSchema"]["required"], json!(["title"]));
        assert_eq!(schema["inputSchema"]["properties"]["color"]["type"], "str");
    }

    #[test]
    fn describe_carries_defaults_through() {
        let schema = describe_tool("project_list").unwrap();
        assert_eq!(schema["inputSchema"]["properties"]["max_count"]["default"], json!(100));
        assert!(
            schema["inputSchema"]["properties"]["offset"]
                .as_object()
                .unwrap()
                .get("default")
                .is_none()
        );
    }

    #[test]
    fn describe_unknown_tool_is_not_found() {
        let err = describe_tool("nope").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Tool not found: nope"));
    }
}
