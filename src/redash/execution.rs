use crate::constants::polling::{EXECUTE_TIMEOUT_MS, POLL_INTERVAL_MS};
use crate::errors::ToolError;
use crate::redash::client::RedashClient;
use crate::redash::models::{ExecutionResponse, JobState, JobStatus, QueryResult};
use crate::services::logger::Logger;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The two upstream calls the poll loop needs. [`RedashClient`] is the real
/// implementation; tests drive the engine through a scripted one.
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    async fn submit(
        &self,
        query_id: i64,
        body: &Value,
        context: &str,
    ) -> Result<ExecutionResponse, ToolError>;

    async fn job_status(&self, job_id: &str) -> Result<JobState, ToolError>;
}

#[async_trait]
impl ExecutionApi for RedashClient {
    async fn submit(
        &self,
        query_id: i64,
        body: &Value,
        context: &str,
    ) -> Result<ExecutionResponse, ToolError> {
        self.submit_results(query_id, body, context).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobState, ToolError> {
        self.job(job_id).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_ms: EXECUTE_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

/// Bookkeeping for a single poll loop. Created when a pending response comes
/// back, discarded when the loop ends; never outlives its `execute` call.
struct PollSession {
    deadline: Instant,
    interval: Duration,
}

impl PollSession {
    fn begin(settings: &PollSettings) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_millis(settings.timeout_ms),
            interval: Duration::from_millis(settings.poll_interval_ms),
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Drives query execution against Redash: submits the run, and when the
/// response is an asynchronous job handle, polls the job until a terminal
/// state or the deadline. Polls within one call are strictly sequential and
/// the inter-poll wait is a cooperative `tokio::time::sleep`, so cancelling
/// the owning call (dropping the future) tears everything down.
pub struct ExecutionEngine {
    api: Arc<dyn ExecutionApi>,
    settings: PollSettings,
    logger: Logger,
}

impl ExecutionEngine {
    pub fn new(api: Arc<dyn ExecutionApi>, logger: Logger) -> Self {
        Self::with_settings(api, PollSettings::default(), logger)
    }

    pub fn with_settings(api: Arc<dyn ExecutionApi>, settings: PollSettings, logger: Logger) -> Self {
        Self {
            api,
            settings,
            logger: logger.child("execution"),
        }
    }

    /// Runs a query and waits for its result. An immediate response returns
    /// without a single status poll; a pending one enters the poll loop.
    pub async fn execute(
        &self,
        query_id: i64,
        parameters: Option<serde_json::Map<String, Value>>,
    ) -> Result<QueryResult, ToolError> {
        let body = serde_json::json!({
            "parameters": Value::Object(parameters.unwrap_or_default()),
        });
        let context = format!("Failed to execute query {}", query_id);
        match self.api.submit(query_id, &body, &context).await? {
            ExecutionResponse::Immediate(result) => Ok(*result),
            ExecutionResponse::Pending(handle) => {
                self.logger.debug(
                    &format!("Query {} queued as job {}", query_id, handle.id),
                    None,
                );
                self.wait_for_job(&handle.id).await
            }
        }
    }

    /// Inspects the result cache without running anything. A job handle here
    /// means no fresh-enough cached result exists, which is an explicit
    /// absence rather than an error; this path never polls.
    pub async fn cached_result(
        &self,
        query_id: i64,
        max_age_seconds: u64,
    ) -> Result<Option<QueryResult>, ToolError> {
        let body = serde_json::json!({ "max_age": max_age_seconds });
        let context = format!("Failed to get cached results for query {}", query_id);
        match self.api.submit(query_id, &body, &context).await? {
            ExecutionResponse::Immediate(result) => Ok(Some(*result)),
            ExecutionResponse::Pending(_) => Ok(None),
        }
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<QueryResult, ToolError> {
        let session = PollSession::begin(&self.settings);
        loop {
            if session.expired() {
                return Err(ToolError::timeout(format!(
                    "Query execution timed out after {}ms",
                    self.settings.timeout_ms
                )));
            }

            // Transport failures here are terminal for the whole call.
            let state = self.api.job_status(job_id).await?;
            match JobStatus::from_code(state.status) {
                JobStatus::Succeeded => {
                    return state.result.ok_or_else(|| {
                        ToolError::internal(format!(
                            "Job {} succeeded without a result body",
                            job_id
                        ))
                    });
                }
                JobStatus::Failed => {
                    return Err(ToolError::query_failed(state.error.unwrap_or_else(|| {
                        format!("Job {} failed without an error message", job_id)
                    })));
                }
                JobStatus::InProgress(code) => {
                    self.logger.debug(
                        &format!("Job {} still running (status {})", job_id, code),
                        None,
                    );
                    tokio::time::sleep(session.interval).await;
                }
            }
        }
    }
}
