use crate::constants::results::DEFAULT_MAX_AGE_SECONDS;
use crate::errors::ToolError;
use crate::managers::queries::{read_u64, require_id};
use crate::redash::ExecutionEngine;
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The execute-query and get-query-results tools, backed by the poll engine.
pub struct ExecutionManager {
    logger: Logger,
    engine: Arc<ExecutionEngine>,
}

impl ExecutionManager {
    pub fn new(logger: Logger, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            logger: logger.child("execute"),
            engine,
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value, ToolError> {
        let query_id = require_id(args, "queryId")?;
        let parameters = match args.get("parameters") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                return Err(ToolError::invalid_params("parameters must be an object"));
            }
        };
        let result = self
            .engine
            .execute(query_id, parameters)
            .await
            .map_err(|err| err.prefixed("Failed to execute query"))?;
        serde_json::to_value(result)
            .map_err(|err| ToolError::internal(format!("Failed to render result: {}", err)))
    }

    async fn cached_results(&self, args: &Value) -> Result<Value, ToolError> {
        let query_id = require_id(args, "queryId")?;
        let max_age = read_u64(args, "maxAge").unwrap_or(DEFAULT_MAX_AGE_SECONDS);
        let cached = self
            .engine
            .cached_result(query_id, max_age)
            .await
            .map_err(|err| err.prefixed("Failed to get query results"))?;
        match cached {
            Some(result) => serde_json::to_value(result)
                .map_err(|err| ToolError::internal(format!("Failed to render result: {}", err))),
            // Absence of a fresh-enough cached result is a normal outcome and
            // is rendered as a plain sentence, not an error payload.
            None => Ok(Value::String(format!(
                "No cached results available for query {} (maxAge: {}s). \
                 Please use execute-query to run the query first.",
                query_id, max_age
            ))),
        }
    }
}

#[async_trait]
impl ToolHandler for ExecutionManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        match tool {
            "execute-query" => self.execute(&args).await,
            "get-query-results" => self.cached_results(&args).await,
            other => {
                self.logger
                    .error(&format!("Unexpectedly routed tool: {}", other), None);
                Err(ToolError::not_found(format!("Unknown tool: {}", other)))
            }
        }
    }
}
