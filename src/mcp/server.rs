//! JSON-RPC plumbing: read a request per line from stdin, write a
//! response per line to stdout. Tool failures travel inside a successful
//! response (`isError`), protocol failures use JSON-RPC error codes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{resources, tools, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::config::Config;
use crate::db::Database;
use crate::error::JobError;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

pub struct Server {
    pub(super) db: Database,
    pub(super) config: Config,
}

impl Server {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    /// Serve until stdin closes or the token fires.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), JobError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                return Ok(()); // EOF
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
            }
        }
    }

    async fn handle_message(&self, raw: &str) -> Option<RpcResponse> {
        let req: RpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!(%e, "unparseable request");
                return Some(RpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error"));
            }
        };

        debug!(method = %req.method, "mcp request");
        let id = req.id.clone().unwrap_or(Value::Null);

        match req.method.as_str() {
            "initialize" => Some(RpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {}, "resources": {} },
                    "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
                }),
            )),
            // Notification: no response.
            "initialized" | "notifications/initialized" => None,
            "tools/list" => Some(RpcResponse::success(
                id,
                json!({ "tools": tools::definitions() }),
            )),
            "tools/call" => Some(self.handle_tool_call(id, req.params)),
            "resources/list" => Some(RpcResponse::success(
                id,
                json!({ "resources": resources::definitions() }),
            )),
            "resources/read" => Some(self.handle_resource_read(id, req.params)),
            _ => Some(RpcResponse::failure(id, METHOD_NOT_FOUND, "Method not found")),
        }
    }

    fn handle_tool_call(&self, id: Value, params: Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match self.call_tool(name, arguments) {
            Ok(result) => {
                let text = match result {
                    Value::String(s) => s,
                    other => serde_json::to_string_pretty(&other).unwrap_or_default(),
                };
                RpcResponse::success(
                    id,
                    json!({ "content": [{ "type": "text", "text": text }] }),
                )
            }
            Err(JobError::NotFound(msg)) if msg.starts_with("tool") => {
                RpcResponse::failure(id, INVALID_PARAMS, msg)
            }
            Err(e) => RpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": e.to_string() }],
                    "isError": true,
                }),
            ),
        }
    }

    fn handle_resource_read(&self, id: Value, params: Value) -> RpcResponse {
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return RpcResponse::failure(id, INVALID_PARAMS, "Invalid params: missing uri");
        };

        match resources::read(&self.db, &self.config, uri) {
            Ok(text) => RpcResponse::success(
                id,
                json!({
                    "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }],
                }),
            ),
            Err(e) => RpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_server() -> Server {
        Server::new(Database::in_memory().unwrap(), Config::default())
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn initialized_notification_gets_no_response() {
        let server = make_server();
        assert!(server
            .handle_message(r#"{"jsonrpc":"2.0","method":"initialized"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"bogus/method"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let server = make_server();
        let resp = server.handle_message("not json at all").await.unwrap();
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn tools_list_names_every_tool() {
        let server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#)
            .await
            .unwrap();

        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        for expected in [
            "list_conversations",
            "get_conversation",
            "get_pending_actions",
            "search_conversations",
            "get_stats",
            "merge_conversations",
            "archive_conversation",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let server = make_server();
        let resp = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn list_conversations_on_empty_store() {
        let server = make_server();
        let resp = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"list_conversations","arguments":{}}}"#,
            )
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert!(result["isError"].is_null());
        assert_eq!(result["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn resources_read_summary() {
        let server = make_server();
        let resp = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":6,"method":"resources/read","params":{"uri":"jobsearch://summary"}}"#,
            )
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["contents"][0]["mimeType"], "text/plain");
        assert!(result["contents"][0]["text"].as_str().unwrap().contains("Job Search"));
    }

    #[tokio::test]
    async fn unknown_resource_uri_fails() {
        let server = make_server();
        let resp = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"jobsearch://nope"}}"#,
            )
            .await
            .unwrap();
        assert!(resp.error.is_some());
    }
}
