use serde_json::Value;

/// Projects an upstream paginated body ({count, page, page_size, results})
/// into the summary shape tool callers see: camelCase page size and only the
/// named fields of each row.
pub fn summarize_page(body: &Value, fields: &[&str]) -> Value {
    let results = body
        .get("results")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let mut picked = serde_json::Map::new();
                    if let Some(obj) = row.as_object() {
                        for field in fields {
                            if let Some(value) = obj.get(*field) {
                                picked.insert((*field).to_string(), value.clone());
                            }
                        }
                    }
                    Value::Object(picked)
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    serde_json::json!({
        "count": body.get("count").cloned().unwrap_or(Value::Null),
        "page": body.get("page").cloned().unwrap_or(Value::Null),
        "pageSize": body.get("page_size").cloned().unwrap_or(Value::Null),
        "results": results,
    })
}
