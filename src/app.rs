use crate::errors::ToolError;
use crate::managers::dashboards::DashboardManager;
use crate::managers::execution::ExecutionManager;
use crate::managers::queries::QueryManager;
use crate::mcp::catalog::tool_catalog;
use crate::mcp::resources::ResourceManager;
use crate::redash::{ExecutionApi, ExecutionEngine, RedashClient};
use crate::services::config::RedashConfig;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
    pub resources: Arc<ResourceManager>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have a handler.".to_string())
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("redash-mcp");
        let config = RedashConfig::from_env()?;

        let client = Arc::new(RedashClient::new(&config, logger.clone())?);
        let engine = Arc::new(ExecutionEngine::new(
            Arc::clone(&client) as Arc<dyn ExecutionApi>,
            logger.clone(),
        ));

        let query_manager: Arc<dyn ToolHandler> =
            Arc::new(QueryManager::new(logger.clone(), client.clone()));
        let execution_manager: Arc<dyn ToolHandler> =
            Arc::new(ExecutionManager::new(logger.clone(), engine.clone()));
        let dashboard_manager: Arc<dyn ToolHandler> =
            Arc::new(DashboardManager::new(logger.clone(), client.clone()));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for tool in [
            "list-queries",
            "get-query",
            "create-query",
            "update-query",
            "archive-query",
            "list-data-sources",
            "list-query-tags",
        ] {
            handlers.insert(tool.to_string(), query_manager.clone());
        }
        for tool in ["execute-query", "get-query-results"] {
            handlers.insert(tool.to_string(), execution_manager.clone());
        }
        for tool in ["list-dashboards", "get-dashboard"] {
            handlers.insert(tool.to_string(), dashboard_manager.clone());
        }

        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));
        let resources = Arc::new(ResourceManager::new(logger.clone(), client, engine));

        Ok(Self {
            logger,
            tool_executor,
            resources,
        })
    }
}
