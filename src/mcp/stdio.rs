use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::core::app_state::AppState;
use crate::store::ResourceStore;

use super::http::{dispatch_tool, list_tools};

const PROTOCOL_VERSION: &str = "2024-11-05";

fn jsonrpc_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn jsonrpc_error(id: &Value, code: i64, message: impl Into<String>) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message.into() } })
}

async fn handle_request(state: &Arc<AppState>, id: &Value, method: &str, params: &Value) -> Value {
    match method {
        "initialize" => jsonrpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {}, "resources": {} },
                "serverInfo": {
                    "name": "pulse-crawl",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => jsonrpc_result(id, json!({})),
        "tools/list" => {
            let tools = list_tools();
            match serde_json::to_value(&tools) {
                Ok(value) => jsonrpc_result(id, value),
                Err(e) => jsonrpc_error(id, -32603, format!("failed to serialize tools: {}", e)),
            }
        }
        "tools/call" => {
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return jsonrpc_error(id, -32602, "Missing required field: params.name");
            };
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let response = dispatch_tool(state, name, &arguments).await;
            match serde_json::to_value(&response) {
                Ok(value) => jsonrpc_result(id, value),
                Err(e) => jsonrpc_error(id, -32603, format!("failed to serialize result: {}", e)),
            }
        }
        "resources/read" => {
            let Some(uri) = params.get("uri").and_then(Value::as_str) else {
                return jsonrpc_error(id, -32602, "Missing required field: params.uri");
            };
            match state.store.read(uri).await {
                Ok(Some(entry)) => jsonrpc_result(
                    id,
                    json!({
                        "contents": [{
                            "uri": entry.uri,
                            "mimeType": entry.mime_type,
                            "text": entry.payload,
                        }]
                    }),
                ),
                Ok(None) => jsonrpc_error(id, -32002, format!("Resource not found: {}", uri)),
                Err(e) => jsonrpc_error(id, -32603, format!("Failed to read {}: {}", uri, e)),
            }
        }
        other => jsonrpc_error(id, -32601, format!("Method not found: {}", other)),
    }
}

/// Newline-delimited JSON-RPC 2.0 loop over stdin/stdout. Logs go to
/// stderr so the protocol stream stays clean.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    info!("pulse-crawl stdio transport ready");

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("dropping unparseable frame: {}", e);
                continue;
            }
        };

        let method = message.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
        let params = message.get("params").cloned().unwrap_or_else(|| json!({}));
        let id = message.get("id").cloned();

        // Notifications carry no id and get no reply.
        let Some(id) = id else {
            if !method.is_empty() && !method.starts_with("notifications/") {
                warn!("ignoring id-less request: {}", method);
            }
            continue;
        };

        let response = handle_request(&state, &id, &method, &params).await;
        let mut frame = serde_json::to_vec(&response)?;
        frame.push(b'\n');
        stdout.write_all(&frame).await?;
        stdout.flush().await?;
    }

    info!("stdin closed — shutting down");
    Ok(())
}
