use crate::constants::polling::{STATUS_FAILED, STATUS_SUCCEEDED};
use crate::errors::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One column of a query result, as Redash reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub friendly_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultData {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

/// A completed query result record (`query_result` body on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: i64,
    pub query_id: i64,
    pub data_source_id: i64,
    #[serde(default)]
    pub query_hash: String,
    #[serde(default)]
    pub query: String,
    pub data: ResultData,
    #[serde(default)]
    pub runtime: f64,
    #[serde(default)]
    pub retrieved_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

/// Raw job state returned by `GET /api/jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub id: String,
    pub status: i64,
    #[serde(default)]
    pub result: Option<QueryResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobEnvelope {
    pub job: JobState,
}

/// Coarse view of the raw status code. Redash documents 3 as success and 4 as
/// failure; every other code is deliberately treated as still running and left
/// to the poll deadline, so undocumented intermediate codes do not break the
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InProgress(i64),
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            STATUS_SUCCEEDED => JobStatus::Succeeded,
            STATUS_FAILED => JobStatus::Failed,
            other => JobStatus::InProgress(other),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Outcome of `POST /api/queries/{id}/results`: either a finished result or a
/// handle to a job still running server-side.
#[derive(Debug, Clone)]
pub enum ExecutionResponse {
    Immediate(Box<QueryResult>),
    Pending(JobHandle),
}

impl ExecutionResponse {
    /// Decodes the response body at the transport boundary. A body carrying a
    /// `job` object is a pending execution; anything else must parse as a
    /// complete result record.
    pub fn from_body(body: Value) -> Result<Self, ToolError> {
        if let Some(job) = body.get("job") {
            let handle: JobHandle = serde_json::from_value(job.clone()).map_err(|err| {
                ToolError::internal(format!("Unrecognized job handle in response: {}", err))
            })?;
            return Ok(ExecutionResponse::Pending(handle));
        }
        let result: QueryResult = serde_json::from_value(body).map_err(|err| {
            ToolError::internal(format!("Unrecognized execution response: {}", err))
        })?;
        Ok(ExecutionResponse::Immediate(Box::new(result)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCount {
    pub name: String,
    pub count: u64,
}

/// `GET /api/queries/tags` returns either bare tag strings or `{name, count}`
/// objects depending on the Redash version; both normalize to [`TagCount`]
/// with a zero count for bare strings. Entries of any other shape are dropped.
pub fn normalize_tags(body: &Value) -> Vec<TagCount> {
    let Some(entries) = body.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            if let Some(name) = entry.as_str() {
                return Some(TagCount {
                    name: name.to_string(),
                    count: 0,
                });
            }
            let obj = entry.as_object()?;
            let name = obj.get("name").and_then(|v| v.as_str())?;
            let count = obj.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
            Some(TagCount {
                name: name.to_string(),
                count,
            })
        })
        .collect()
}
