use serde_json::Value;

/// Pretty-prints a payload for the text content block of a tool response.
pub fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::format_json;

    #[test]
    fn format_json_is_indented() {
        let rendered = format_json(&serde_json::json!({"a": 1}));
        assert!(rendered.contains("\n"));
        assert!(rendered.contains("\"a\": 1"));
    }
}
