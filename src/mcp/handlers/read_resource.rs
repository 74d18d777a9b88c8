use std::sync::Arc;

use serde_json::Value;

use crate::core::app_state::AppState;
use crate::mcp::{ContentBlock, EmbeddedResource, McpCallResponse};
use crate::store::ResourceStore;

pub async fn handle(state: &Arc<AppState>, arguments: &Value) -> McpCallResponse {
    let Some(uri) = arguments.get("uri").and_then(Value::as_str) else {
        return McpCallResponse::error("Missing required parameter: uri");
    };

    match state.store.read(uri).await {
        Ok(Some(entry)) => McpCallResponse::blocks(vec![ContentBlock::Resource {
            resource: EmbeddedResource {
                uri: entry.uri,
                mime_type: entry.mime_type,
                name: Some(entry.url),
                text: Some(entry.payload),
            },
        }]),
        Ok(None) => McpCallResponse::error(format!("Resource not found: {}", uri)),
        Err(e) => McpCallResponse::error(format!("Failed to read {}: {}", uri, e)),
    }
}
