use crate::errors::ToolError;
use crate::services::logger::Logger;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A manager that serves one or more catalog tools. Arguments arrive already
/// validated against the tool's input schema, with schema defaults applied.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError>;
}

pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn has_handler(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            return Err(ToolError::not_found(format!("Unknown tool: {}", tool)));
        };
        self.logger.debug(&format!("Tool invoked: {}", tool), None);
        let started = Instant::now();
        let result = handler.handle(tool, args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.debug(
                &format!("Tool {} completed", tool),
                Some(&serde_json::json!({ "duration_ms": duration_ms })),
            ),
            Err(err) => self.logger.error(
                &format!("Tool {} failed: {}", tool, err),
                Some(&serde_json::json!({ "duration_ms": duration_ms, "code": err.code })),
            ),
        }
        result
    }
}
