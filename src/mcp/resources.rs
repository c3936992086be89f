use crate::constants::pagination::{DEFAULT_PAGE, RESOURCE_LIST_PAGE_SIZE};
use crate::errors::ToolError;
use crate::redash::{ExecutionEngine, RedashClient};
use crate::services::logger::Logger;
use crate::utils::output::format_json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

static RESOURCE_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^redash://(query|dashboard)/(\d+)$").expect("valid resource regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Query,
    Dashboard,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Query => "query",
            ResourceKind::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: i64,
}

/// Parses `redash://query/<id>` and `redash://dashboard/<id>`. Anything else,
/// including non-numeric ids and unknown kinds, is a resource-URI error that
/// names the offending string.
pub fn parse_resource_uri(uri: &str) -> Result<ResourceRef, ToolError> {
    let captures = RESOURCE_URI
        .captures(uri)
        .ok_or_else(|| ToolError::resource_uri(format!("Invalid resource URI: {}", uri)))?;
    let kind = match &captures[1] {
        "query" => ResourceKind::Query,
        _ => ResourceKind::Dashboard,
    };
    let id = captures[2]
        .parse::<i64>()
        .map_err(|_| ToolError::resource_uri(format!("Invalid resource URI: {}", uri)))?;
    Ok(ResourceRef { kind, id })
}

pub struct ResourceManager {
    logger: Logger,
    client: Arc<RedashClient>,
    engine: Arc<ExecutionEngine>,
}

impl ResourceManager {
    pub fn new(logger: Logger, client: Arc<RedashClient>, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            logger: logger.child("resources"),
            client,
            engine,
        }
    }

    /// First page of queries and dashboards as addressable resources. An
    /// upstream failure degrades to an empty list rather than a protocol
    /// error.
    pub async fn list(&self) -> Value {
        match self.collect().await {
            Ok(resources) => serde_json::json!({ "resources": resources }),
            Err(err) => {
                self.logger
                    .error(&format!("Error listing resources: {}", err), None);
                serde_json::json!({ "resources": [] })
            }
        }
    }

    async fn collect(&self) -> Result<Vec<Value>, ToolError> {
        let mut resources = Vec::new();

        let queries = self
            .client
            .list_queries(DEFAULT_PAGE, RESOURCE_LIST_PAGE_SIZE, None, None)
            .await?;
        for query in queries
            .get("results")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            let Some(id) = query.get("id").and_then(|v| v.as_i64()) else {
                continue;
            };
            let description = query
                .get("description")
                .and_then(|v| v.as_str())
                .filter(|text| !text.is_empty())
                .map(|text| text.to_string())
                .unwrap_or_else(|| format!("Query ID: {}", id));
            resources.push(serde_json::json!({
                "uri": format!("redash://query/{}", id),
                "name": query.get("name").cloned().unwrap_or(Value::Null),
                "description": description,
            }));
        }

        let dashboards = self
            .client
            .list_dashboards(DEFAULT_PAGE, RESOURCE_LIST_PAGE_SIZE)
            .await?;
        for dashboard in dashboards
            .get("results")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            let Some(id) = dashboard.get("id").and_then(|v| v.as_i64()) else {
                continue;
            };
            resources.push(serde_json::json!({
                "uri": format!("redash://dashboard/{}", id),
                "name": dashboard.get("name").cloned().unwrap_or(Value::Null),
                "description": format!("Dashboard ID: {}", id),
            }));
        }

        Ok(resources)
    }

    /// Reads one resource. A query resource carries the definition plus a
    /// freshly executed result; a dashboard resource carries its definition.
    pub async fn read(&self, uri: &str) -> Result<Value, ToolError> {
        let reference = parse_resource_uri(uri)?;
        let text = match reference.kind {
            ResourceKind::Query => {
                let query = self.client.get_query(reference.id).await?;
                let result = self.engine.execute(reference.id, None).await?;
                let result = serde_json::to_value(result).map_err(|err| {
                    ToolError::internal(format!("Failed to render result: {}", err))
                })?;
                format_json(&serde_json::json!({ "query": query, "result": result }))
            }
            ResourceKind::Dashboard => {
                let dashboard = self.client.get_dashboard(reference.id).await?;
                format_json(&dashboard)
            }
        };
        Ok(serde_json::json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": text,
            }]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolErrorKind;

    #[test]
    fn query_uri_round_trips() {
        let parsed = parse_resource_uri("redash://query/123").unwrap();
        assert_eq!(parsed.kind, ResourceKind::Query);
        assert_eq!(parsed.kind.as_str(), "query");
        assert_eq!(parsed.id, 123);
    }

    #[test]
    fn dashboard_uri_round_trips() {
        let parsed = parse_resource_uri("redash://dashboard/9").unwrap();
        assert_eq!(parsed.kind, ResourceKind::Dashboard);
        assert_eq!(parsed.id, 9);
    }

    #[test]
    fn unknown_kind_is_rejected_with_the_uri() {
        let err = parse_resource_uri("redash://bogus/1").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::ResourceUri);
        assert!(err.message.contains("redash://bogus/1"));
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        let err = parse_resource_uri("redash://query/abc").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::ResourceUri);
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(parse_resource_uri("https://query/1").is_err());
        assert!(parse_resource_uri("redash://query/1/extra").is_err());
    }
}
