use crate::errors::ToolError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_MAP: Lazy<HashMap<String, ToolDef>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .cloned()
        .map(|tool| (tool.name.clone(), tool))
        .collect()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_MAP.get(name)
}

/// Validates call arguments against the tool's declared input schema.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), ToolError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, errors);
        return Err(ToolError::invalid_params(message));
    }
    Ok(())
}

/// Fills in schema-declared `default` values for properties the caller left
/// out (page, pageSize, maxAge).
pub fn apply_schema_defaults(tool_name: &str, args: Value) -> Value {
    let Some(tool) = tool_by_name(tool_name) else {
        return args;
    };
    let Some(properties) = tool
        .input_schema
        .get("properties")
        .and_then(|v| v.as_object())
    else {
        return args;
    };

    let mut out = match args {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => return other,
    };
    for (key, declared) in properties {
        if out.contains_key(key) {
            continue;
        }
        if let Some(default) = declared.get("default") {
            out.insert(key.clone(), default.clone());
        }
    }
    Value::Object(out)
}

fn format_schema_errors(tool_name: &str, errors: jsonschema::ErrorIterator) -> String {
    let mut lines = vec![format!("Invalid arguments for {}", tool_name)];
    for err in errors.take(10) {
        let instance_path = if err.instance_path.to_string().is_empty() {
            "(root)".to_string()
        } else {
            err.instance_path.to_string()
        };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                for unknown in unexpected {
                    lines.push(format!("- {}: unknown field '{}'", instance_path, unknown));
                }
                if unexpected.is_empty() {
                    lines.push(format!("- {}: unknown field", instance_path));
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| property.to_string());
                lines.push(format!(
                    "- {}: missing required field '{}'",
                    instance_path, prop
                ));
            }
            jsonschema::error::ValidationErrorKind::Type { kind } => {
                lines.push(format!(
                    "- {}: expected {}",
                    instance_path,
                    format_type_kind(kind)
                ));
            }
            _ => {
                lines.push(format!("- {}: {}", instance_path, err));
            }
        }
    }
    lines.join("\n")
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolErrorKind;
    use serde_json::json;

    #[test]
    fn catalog_declares_all_eleven_tools() {
        let names: Vec<&str> = tool_catalog().iter().map(|t| t.name.as_str()).collect();
        for expected in [
            "list-queries",
            "get-query",
            "create-query",
            "update-query",
            "archive-query",
            "list-data-sources",
            "list-query-tags",
            "execute-query",
            "get-query-results",
            "list-dashboards",
            "get-dashboard",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn defaults_fill_page_and_page_size() {
        let args = apply_schema_defaults("list-queries", json!({}));
        assert_eq!(args["page"], 1);
        assert_eq!(args["pageSize"], 25);
    }

    #[test]
    fn defaults_fill_max_age_but_keep_caller_values() {
        let args = apply_schema_defaults("get-query-results", json!({"queryId": 5}));
        assert_eq!(args["maxAge"], 86400);

        let args = apply_schema_defaults("get-query-results", json!({"queryId": 5, "maxAge": 60}));
        assert_eq!(args["maxAge"], 60);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = validate_tool_args("get-query", &json!({})).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
        assert!(err.message.contains("queryId"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = validate_tool_args("archive-query", &json!({"queryId": 1, "bogus": true}))
            .unwrap_err();
        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = validate_tool_args("get-dashboard", &json!({"dashboardId": "nine"})).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
    }
}
