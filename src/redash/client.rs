use crate::errors::ToolError;
use crate::redash::models::{normalize_tags, ExecutionResponse, JobEnvelope, JobState, TagCount};
use crate::services::config::RedashConfig;
use crate::services::logger::Logger;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Fields accepted by `POST /api/queries/{id}` for partial updates. Anything
/// else in the caller payload is dropped before it reaches the wire.
const UPDATE_FIELDS: &[&str] = &[
    "name",
    "data_source_id",
    "query",
    "description",
    "options",
    "schedule",
    "tags",
    "is_archived",
    "is_draft",
];

/// Authenticated client for the Redash REST API. Shared read-only across all
/// tool invocations; holds no mutable state beyond reqwest's connection pool.
pub struct RedashClient {
    http: Client,
    base_url: Url,
    logger: Logger,
}

impl RedashClient {
    pub fn new(config: &RedashConfig, logger: Logger) -> Result<Self, ToolError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| ToolError::config(format!("Invalid REDASH_URL: {}", err)))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Key {}", config.api_key))
            .map_err(|_| ToolError::config("REDASH_API_KEY contains invalid header bytes"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            http,
            base_url,
            logger: logger.child("redash"),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ToolError> {
        self.base_url
            .join(path)
            .map_err(|err| ToolError::internal(format!("Invalid endpoint path {}: {}", path, err)))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        context: &str,
    ) -> Result<Value, ToolError> {
        let url = self.endpoint(path)?;
        self.logger
            .debug(&format!("{} {}", method, path), None);

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| map_send_error(err, context))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.logger.error(context, None);
            return Err(ToolError::transport(format!(
                "{} ({}): {}",
                context,
                status.as_u16(),
                body
            ))
            .with_details(serde_json::json!({
                "status": status.as_u16(),
                "body": body,
            })));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response
            .text()
            .await
            .map_err(|err| map_send_error(err, context))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| {
            ToolError::transport(format!("{}: invalid JSON in response: {}", context, err))
        })
    }

    pub async fn list_queries(
        &self,
        page: u64,
        page_size: u64,
        tags: Option<&[String]>,
        search: Option<&str>,
    ) -> Result<Value, ToolError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        if let Some(tags) = tags {
            if !tags.is_empty() {
                query.push(("tags", tags.join(",")));
            }
        }
        if let Some(search) = search {
            if !search.is_empty() {
                query.push(("q", search.to_string()));
            }
        }
        self.request(
            Method::GET,
            "api/queries",
            &query,
            None,
            "Failed to fetch queries",
        )
        .await
    }

    pub async fn get_query(&self, query_id: i64) -> Result<Value, ToolError> {
        self.request(
            Method::GET,
            &format!("api/queries/{}", query_id),
            &[],
            None,
            &format!("Failed to fetch query {}", query_id),
        )
        .await
    }

    pub async fn create_query(&self, params: &Value) -> Result<Value, ToolError> {
        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        self.logger
            .info(&format!("Creating query: {}", name), None);

        let payload = serde_json::json!({
            "name": params.get("name").cloned().unwrap_or(Value::Null),
            "data_source_id": params.get("data_source_id").cloned().unwrap_or(Value::Null),
            "query": params.get("query").cloned().unwrap_or(Value::Null),
            "description": params.get("description").cloned().unwrap_or(Value::String(String::new())),
            "options": params.get("options").cloned().unwrap_or_else(|| Value::Object(Default::default())),
            "schedule": params.get("schedule").cloned().unwrap_or(Value::Null),
            "tags": params.get("tags").cloned().unwrap_or(Value::Array(Vec::new())),
        });
        let created = self
            .request(
                Method::POST,
                "api/queries",
                &[],
                Some(&payload),
                "Failed to create query",
            )
            .await?;
        if let Some(id) = created.get("id").and_then(|v| v.as_i64()) {
            self.logger
                .info(&format!("Query created with ID: {}", id), None);
        }
        Ok(created)
    }

    pub async fn update_query(&self, query_id: i64, params: &Value) -> Result<Value, ToolError> {
        self.logger
            .debug(&format!("Updating query {}", query_id), None);

        let mut payload = serde_json::Map::new();
        if let Some(obj) = params.as_object() {
            for field in UPDATE_FIELDS {
                if let Some(value) = obj.get(*field) {
                    payload.insert((*field).to_string(), value.clone());
                }
            }
        }
        self.request(
            Method::POST,
            &format!("api/queries/{}", query_id),
            &[],
            Some(&Value::Object(payload)),
            &format!("Failed to update query {}", query_id),
        )
        .await
    }

    pub async fn archive_query(&self, query_id: i64) -> Result<Value, ToolError> {
        self.logger
            .debug(&format!("Archiving query {}", query_id), None);
        self.request(
            Method::DELETE,
            &format!("api/queries/{}", query_id),
            &[],
            None,
            &format!("Failed to archive query {}", query_id),
        )
        .await?;
        Ok(serde_json::json!({ "success": true }))
    }

    pub async fn data_sources(&self) -> Result<Value, ToolError> {
        self.request(
            Method::GET,
            "api/data_sources",
            &[],
            None,
            "Failed to fetch data sources",
        )
        .await
    }

    pub async fn query_tags(&self) -> Result<Vec<TagCount>, ToolError> {
        let body = self
            .request(
                Method::GET,
                "api/queries/tags",
                &[],
                None,
                "Failed to fetch query tags",
            )
            .await?;
        // Some Redash versions wrap the list in {"tags": [...]}.
        let entries = body.get("tags").cloned().unwrap_or(body);
        Ok(normalize_tags(&entries))
    }

    pub(crate) async fn submit_results(
        &self,
        query_id: i64,
        body: &Value,
        context: &str,
    ) -> Result<ExecutionResponse, ToolError> {
        let response = self
            .request(
                Method::POST,
                &format!("api/queries/{}/results", query_id),
                &[],
                Some(body),
                context,
            )
            .await?;
        ExecutionResponse::from_body(response)
    }

    pub(crate) async fn job(&self, job_id: &str) -> Result<JobState, ToolError> {
        let context = format!("Failed to poll job {}", job_id);
        let body = self
            .request(
                Method::GET,
                &format!("api/jobs/{}", job_id),
                &[],
                None,
                &context,
            )
            .await?;
        let envelope: JobEnvelope = serde_json::from_value(body).map_err(|err| {
            ToolError::transport(format!("{}: unrecognized job body: {}", context, err))
        })?;
        Ok(envelope.job)
    }

    pub async fn list_dashboards(&self, page: u64, page_size: u64) -> Result<Value, ToolError> {
        self.request(
            Method::GET,
            "api/dashboards",
            &[
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
            ],
            None,
            "Failed to fetch dashboards",
        )
        .await
    }

    pub async fn get_dashboard(&self, dashboard_id: i64) -> Result<Value, ToolError> {
        self.request(
            Method::GET,
            &format!("api/dashboards/{}", dashboard_id),
            &[],
            None,
            &format!("Failed to fetch dashboard {}", dashboard_id),
        )
        .await
    }
}

fn map_send_error(err: reqwest::Error, context: &str) -> ToolError {
    if err.is_timeout() {
        return ToolError::transport(format!("{}: request timed out", context));
    }
    if err.is_connect() {
        return ToolError::transport(format!("{}: no response from server", context));
    }
    ToolError::transport(format!("{}: {}", context, err))
}
