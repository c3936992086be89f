use crate::constants::pagination::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::errors::ToolError;
use crate::redash::RedashClient;
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::utils::listing::summarize_page;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const LIST_SUMMARY_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "data_source_id",
    "created_at",
    "updated_at",
    "is_archived",
];

/// Query CRUD plus the two small catalog listings (data sources, tags).
pub struct QueryManager {
    logger: Logger,
    client: Arc<RedashClient>,
}

impl QueryManager {
    pub fn new(logger: Logger, client: Arc<RedashClient>) -> Self {
        Self {
            logger: logger.child("queries"),
            client,
        }
    }

    async fn list(&self, args: &Value) -> Result<Value, ToolError> {
        let page = read_u64(args, "page").unwrap_or(DEFAULT_PAGE);
        let page_size = read_u64(args, "pageSize").unwrap_or(DEFAULT_PAGE_SIZE);
        let tags: Option<Vec<String>> = args
            .get("tag")
            .and_then(|v| v.as_str())
            .map(|tag| vec![tag.to_string()]);
        let search = args.get("search").and_then(|v| v.as_str());

        let body = self
            .client
            .list_queries(page, page_size, tags.as_deref(), search)
            .await
            .map_err(|err| err.prefixed("Failed to list queries"))?;
        Ok(summarize_page(&body, LIST_SUMMARY_FIELDS))
    }

    async fn get(&self, args: &Value) -> Result<Value, ToolError> {
        let query_id = require_id(args, "queryId")?;
        self.client
            .get_query(query_id)
            .await
            .map_err(|err| err.prefixed(format!("Failed to get query {}", query_id)))
    }

    async fn create(&self, args: &Value) -> Result<Value, ToolError> {
        self.client
            .create_query(args)
            .await
            .map_err(|err| err.prefixed("Failed to create query"))
    }

    async fn update(&self, args: &Value) -> Result<Value, ToolError> {
        let query_id = require_id(args, "queryId")?;
        self.client
            .update_query(query_id, args)
            .await
            .map_err(|err| err.prefixed("Failed to update query"))
    }

    async fn archive(&self, args: &Value) -> Result<Value, ToolError> {
        let query_id = require_id(args, "queryId")?;
        self.client
            .archive_query(query_id)
            .await
            .map_err(|err| err.prefixed("Failed to archive query"))
    }

    async fn data_sources(&self) -> Result<Value, ToolError> {
        self.client
            .data_sources()
            .await
            .map_err(|err| err.prefixed("Failed to list data sources"))
    }

    async fn tags(&self) -> Result<Value, ToolError> {
        let tags = self
            .client
            .query_tags()
            .await
            .map_err(|err| err.prefixed("Failed to list query tags"))?;
        serde_json::to_value(tags)
            .map_err(|err| ToolError::internal(format!("Failed to render tags: {}", err)))
    }
}

#[async_trait]
impl ToolHandler for QueryManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        match tool {
            "list-queries" => self.list(&args).await,
            "get-query" => self.get(&args).await,
            "create-query" => self.create(&args).await,
            "update-query" => self.update(&args).await,
            "archive-query" => self.archive(&args).await,
            "list-data-sources" => self.data_sources().await,
            "list-query-tags" => self.tags().await,
            other => {
                self.logger
                    .error(&format!("Unexpectedly routed tool: {}", other), None);
                Err(ToolError::not_found(format!("Unknown tool: {}", other)))
            }
        }
    }
}

pub(crate) fn read_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| v.as_u64())
}

pub(crate) fn require_id(args: &Value, key: &str) -> Result<i64, ToolError> {
    args.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ToolError::invalid_params(format!("{} must be an integer", key)))
}
