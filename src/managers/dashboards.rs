use crate::constants::pagination::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::errors::ToolError;
use crate::managers::queries::{read_u64, require_id};
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
    "slug",
    "created_at",
    "updated_at",
    "is_archived",
    "is_draft",
];

pub struct DashboardManager {
    logger: Logger,
    client: Arc<RedashClient>,
}

impl DashboardManager {
    pub fn new(logger: Logger, client: Arc<RedashClient>) -> Self {
        Self {
            logger: logger.child("dashboards"),
            client,
        }
    }

    async fn list(&self, args: &Value) -> Result<Value, ToolError> {
        let page = read_u64(args, "page").unwrap_or(DEFAULT_PAGE);
        let page_size = read_u64(args, "pageSize").unwrap_or(DEFAULT_PAGE_SIZE);
        let body = self
            .client
            .list_dashboards(page, page_size)
            .await
            .map_err(|err| err.prefixed("Failed to list dashboards"))?;
        Ok(summarize_page(&body, LIST_SUMMARY_FIELDS))
    }

    async fn get(&self, args: &Value) -> Result<Value, ToolError> {
        let dashboard_id = require_id(args, "dashboardId")?;
        self.client
            .get_dashboard(dashboard_id)
            .await
            .map_err(|err| err.prefixed("Failed to get dashboard"))
    }
}

#[async_trait]
impl ToolHandler for DashboardManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        match tool {
            "list-dashboards" => self.list(&args).await,
            "get-dashboard" => self.get(&args).await,
            other => {
                self.logger
                    .error(&format!("Unexpectedly routed tool: {}", other), None);
                Err(ToolError::not_found(format!("Unknown tool: {}", other)))
            }
        }
    }
}
