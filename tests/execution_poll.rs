use async_trait::async_trait;
use redash_mcp::errors::{ToolError, ToolErrorKind};
use redash_mcp::redash::models::{ExecutionResponse, JobHandle, JobState, QueryResult};
use redash_mcp::redash::{ExecutionApi, ExecutionEngine, PollSettings};
use redash_mcp::services::logger::Logger;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn sample_result(id: i64) -> QueryResult {
    serde_json::from_value(json!({
        "id": id,
        "query_id": 123,
        "data_source_id": 1,
        "query_hash": "hash",
        "query": "SELECT 1",
        "data": {
            "columns": [{"name": "one", "type": "integer", "friendly_name": "One"}],
            "rows": [{"one": 1}]
        },
        "runtime": 0.01,
        "retrieved_at": "2024-01-01T00:00:00Z"
    }))
    .expect("sample result must deserialize")
}

fn in_progress(code: i64) -> Result<JobState, ToolError> {
    Ok(JobState {
        id: "job-1".to_string(),
        status: code,
        result: None,
        error: None,
    })
}

fn succeeded(result: QueryResult) -> Result<JobState, ToolError> {
    Ok(JobState {
        id: "job-1".to_string(),
        status: 3,
        result: Some(result),
        error: None,
    })
}

fn failed(message: &str) -> Result<JobState, ToolError> {
    Ok(JobState {
        id: "job-1".to_string(),
        status: 4,
        result: None,
        error: Some(message.to_string()),
    })
}

/// Scripted upstream: one canned submit response, a queue of job states. An
/// exhausted queue keeps answering "still running" so the deadline path can
/// be exercised.
struct ScriptedApi {
    submit_response: Mutex<Option<Result<ExecutionResponse, ToolError>>>,
    statuses: Mutex<VecDeque<Result<JobState, ToolError>>>,
    last_submit_body: Mutex<Option<Value>>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedApi {
    fn new(
        submit: Result<ExecutionResponse, ToolError>,
        statuses: Vec<Result<JobState, ToolError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            submit_response: Mutex::new(Some(submit)),
            statuses: Mutex::new(statuses.into_iter().collect()),
            last_submit_body: Mutex::new(None),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    fn pending() -> Result<ExecutionResponse, ToolError> {
        Ok(ExecutionResponse::Pending(JobHandle {
            id: "job-1".to_string(),
        }))
    }

    fn immediate(result: QueryResult) -> Result<ExecutionResponse, ToolError> {
        Ok(ExecutionResponse::Immediate(Box::new(result)))
    }

    fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionApi for ScriptedApi {
    async fn submit(
        &self,
        _query_id: i64,
        body: &Value,
        _context: &str,
    ) -> Result<ExecutionResponse, ToolError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_submit_body.lock().unwrap() = Some(body.clone());
        self.submit_response
            .lock()
            .unwrap()
            .take()
            .expect("submit scripted exactly once")
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobState, ToolError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| in_progress(2))
    }
}

fn engine_with(api: Arc<ScriptedApi>, timeout_ms: u64, poll_interval_ms: u64) -> ExecutionEngine {
    ExecutionEngine::with_settings(
        api,
        PollSettings {
            timeout_ms,
            poll_interval_ms,
        },
        Logger::new("test"),
    )
}

#[tokio::test]
async fn immediate_response_returns_without_any_status_poll() {
    let api = ScriptedApi::new(ScriptedApi::immediate(sample_result(42)), vec![]);
    let engine = engine_with(api.clone(), 1_000, 10);

    let result = engine.execute(123, None).await.expect("must succeed");
    assert_eq!(result.id, 42);
    assert_eq!(api.status_count(), 0);

    let body = api.last_submit_body.lock().unwrap().clone().unwrap();
    assert_eq!(body, json!({"parameters": {}}));
}

#[tokio::test]
async fn pending_response_polls_at_least_once() {
    let api = ScriptedApi::new(ScriptedApi::pending(), vec![succeeded(sample_result(7))]);
    let engine = engine_with(api.clone(), 1_000, 10);

    let result = engine.execute(123, None).await.expect("must succeed");
    assert_eq!(result.id, 7);
    assert!(api.status_count() >= 1);
}

#[tokio::test]
async fn success_after_two_in_progress_polls_exactly_three_times() {
    let api = ScriptedApi::new(
        ScriptedApi::pending(),
        vec![in_progress(1), in_progress(2), succeeded(sample_result(9))],
    );
    let engine = engine_with(api.clone(), 5_000, 25);

    let started = Instant::now();
    let result = engine.execute(123, None).await.expect("must succeed");
    assert_eq!(result.id, 9);
    assert_eq!(api.status_count(), 3);
    // Two in-progress polls mean two full inter-poll waits.
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn failed_job_surfaces_the_remote_message_and_stops_polling() {
    let api = ScriptedApi::new(
        ScriptedApi::pending(),
        vec![
            in_progress(2),
            failed("SQL syntax error"),
            succeeded(sample_result(1)),
        ],
    );
    let engine = engine_with(api.clone(), 5_000, 10);

    let err = engine.execute(123, None).await.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::QueryFailed);
    assert!(err.message.contains("SQL syntax error"));
    assert_eq!(api.status_count(), 2);
}

#[tokio::test]
async fn never_terminal_job_times_out_with_no_polls_past_the_deadline() {
    let api = ScriptedApi::new(ScriptedApi::pending(), vec![]);
    let engine = engine_with(api.clone(), 150, 40);

    let started = Instant::now();
    let err = engine.execute(123, None).await.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Timeout);
    assert!(err.message.contains("150ms"));
    assert!(started.elapsed() >= Duration::from_millis(150));

    let polls_at_timeout = api.status_count();
    assert!(polls_at_timeout >= 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.status_count(), polls_at_timeout);
}

#[tokio::test]
async fn transport_failure_during_polling_is_terminal() {
    let api = ScriptedApi::new(
        ScriptedApi::pending(),
        vec![
            in_progress(2),
            Err(ToolError::transport("Failed to poll job job-1: no response from server")),
            succeeded(sample_result(1)),
        ],
    );
    let engine = engine_with(api.clone(), 5_000, 10);

    let err = engine.execute(123, None).await.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Transport);
    assert_eq!(api.status_count(), 2);
}

#[tokio::test]
async fn parameters_are_forwarded_in_the_submit_body() {
    let api = ScriptedApi::new(ScriptedApi::immediate(sample_result(1)), vec![]);
    let engine = engine_with(api.clone(), 1_000, 10);

    let mut parameters = serde_json::Map::new();
    parameters.insert("region".to_string(), json!("eu"));
    engine.execute(123, Some(parameters)).await.expect("must succeed");

    let body = api.last_submit_body.lock().unwrap().clone().unwrap();
    assert_eq!(body, json!({"parameters": {"region": "eu"}}));
}

#[tokio::test]
async fn cached_result_reports_absence_without_polling() {
    let api = ScriptedApi::new(ScriptedApi::pending(), vec![succeeded(sample_result(1))]);
    let engine = engine_with(api.clone(), 1_000, 10);

    let cached = engine.cached_result(123, 1).await.expect("must succeed");
    assert!(cached.is_none());
    assert_eq!(api.status_count(), 0);

    let body = api.last_submit_body.lock().unwrap().clone().unwrap();
    assert_eq!(body, json!({"max_age": 1}));
}

#[tokio::test]
async fn cached_result_returns_a_fresh_enough_record() {
    let api = ScriptedApi::new(ScriptedApi::immediate(sample_result(55)), vec![]);
    let engine = engine_with(api.clone(), 1_000, 10);

    let cached = engine.cached_result(123, 86_400).await.expect("must succeed");
    assert_eq!(cached.expect("must be present").id, 55);
}
