use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{apply_schema_defaults, tool_by_name, tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::utils::output::format_json;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "redash-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn text_payload(text: String) -> Value {
    serde_json::json!({
        "content": [ { "type": "text", "text": text } ]
    })
}

fn error_payload(text: String) -> Value {
    serde_json::json!({
        "isError": true,
        "content": [ { "type": "text", "text": text } ]
    })
}

fn map_tool_error(error: &ToolError) -> McpError {
    let code = match error.kind {
        ToolErrorKind::InvalidParams | ToolErrorKind::ResourceUri => ErrorCode::InvalidParams,
        ToolErrorKind::Timeout => ErrorCode::RequestTimeout,
        ToolErrorKind::NotFound => ErrorCode::InvalidRequest,
        _ => ErrorCode::InternalError,
    };
    McpError::new(code, error.message.clone())
}

pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub fn new() -> Result<Self, ToolError> {
        let app = App::initialize()?;
        Ok(Self { app: Arc::new(app) })
    }

    pub fn from_app(app: App) -> Self {
        Self { app: Arc::new(app) }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"list": true, "call": true}, "resources": {"list": true, "read": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": tool_catalog() })
    }

    /// Runs one tool call end to end. Every outcome, including validation
    /// failures and unknown tools, is a content payload; nothing raises past
    /// this boundary.
    pub async fn handle_tools_call(&self, name: &str, raw_args: Value) -> Value {
        if tool_by_name(name).is_none() {
            return error_payload(format!("Unknown tool: {}", name));
        }
        let args = apply_schema_defaults(name, raw_args);
        if let Err(err) = validate_tool_args(name, &args) {
            return error_payload(err.message);
        }
        match self.app.tool_executor.execute(name, args).await {
            // String payloads (the cached-result miss sentence) go out as-is;
            // everything else renders as indented JSON.
            Ok(Value::String(text)) => text_payload(text),
            Ok(value) => text_payload(format_json(&value)),
            Err(err) => error_payload(err.message),
        }
    }

    pub async fn handle_resources_list(&self) -> Value {
        self.app.resources.list().await
    }

    pub async fn handle_resources_read(&self, uri: &str) -> Result<Value, McpError> {
        self.app
            .resources
            .read(uri)
            .await
            .map_err(|err| map_tool_error(&err))
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        self.app.logger.info(
            &format!("Starting {} v{}...", SERVER_NAME, SERVER_VERSION),
            None,
        );

        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut writer = BufWriter::new(stdout);

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        ErrorCode::ParseError.as_i32(),
                        "Parse error".to_string(),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let request: JsonRpcRequest = match serde_json::from_value(parsed) {
                Ok(req) => req,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        ErrorCode::InvalidRequest.as_i32(),
                        "Invalid request".to_string(),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.dispatch(request).await {
                write_response(&mut writer, &response).await?;
            }
        }

        Ok(())
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        match request.method.as_str() {
            "notifications/initialized" => request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({}))),
            _ if request.method.starts_with("notifications/") && request.id.is_none() => None,
            "initialize" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_initialize())),
            "tools/list" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_tools_list())),
            "tools/call" => {
                let id = request.id?;
                let params = request.params.as_object().cloned().unwrap_or_default();
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing tool name".to_string(),
                    ));
                }
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                let payload = self.handle_tools_call(name, args).await;
                Some(JsonRpcResponse::success(id, payload))
            }
            "resources/list" => {
                let id = request.id?;
                Some(JsonRpcResponse::success(
                    id,
                    self.handle_resources_list().await,
                ))
            }
            "resources/read" => {
                let id = request.id?;
                let uri = request
                    .params
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                if uri.is_empty() {
                    return Some(JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing resource uri".to_string(),
                    ));
                }
                match self.handle_resources_read(uri).await {
                    Ok(result) => Some(JsonRpcResponse::success(id, result)),
                    Err(err) => Some(JsonRpcResponse::failure(
                        id,
                        err.code.as_i32(),
                        err.message,
                    )),
                }
            }
            _ => request.id.map(|id| {
                JsonRpcResponse::failure(
                    id,
                    ErrorCode::MethodNotFound.as_i32(),
                    "Method not found".to_string(),
                )
            }),
        }
    }
}

async fn write_response(
    writer: &mut BufWriter<tokio::io::Stdout>,
    response: &JsonRpcResponse,
) -> Result<(), ToolError> {
    let payload = serde_json::to_string(response).unwrap_or_default();
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = McpServer::new()?;
    server.run_stdio().await
}
