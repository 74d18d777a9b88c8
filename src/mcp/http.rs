use std::sync::Arc;

use axum::routing::{get, post};
use axum::{extract::State, response::Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::app_state::AppState;

use super::handlers;
use super::tooling::tool_catalog;
use super::ContentBlock;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCallResponse {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl McpCallResponse {
    pub fn blocks(content: Vec<ContentBlock>) -> Self {
        Self { content, is_error: false }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::blocks(vec![ContentBlock::text(text)])
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: vec![ContentBlock::text(message)], is_error: true }
    }
}

pub fn list_tools() -> McpToolsResponse {
    McpToolsResponse {
        tools: tool_catalog()
            .into_iter()
            .map(|entry| McpTool {
                name: entry.name.to_string(),
                title: entry.title.to_string(),
                description: entry.description.to_string(),
                input_schema: entry.input_schema,
            })
            .collect(),
    }
}

/// Route a tool call to its handler. Unknown tools and handler failures
/// come back as `isError` responses, never as transport errors.
pub async fn dispatch_tool(state: &Arc<AppState>, name: &str, arguments: &Value) -> McpCallResponse {
    match name {
        "scrape" => handlers::scrape::handle(state, arguments).await,
        "map" => handlers::map::handle(state, arguments).await,
        "crawl" => handlers::crawl::handle(state, arguments).await,
        "read_resource" => handlers::read_resource::handle(state, arguments).await,
        other => McpCallResponse::error(format!("Unknown tool: {}", other)),
    }
}

async fn list_tools_route() -> Json<McpToolsResponse> {
    Json(list_tools())
}

async fn call_tool_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpCallRequest>,
) -> Json<McpCallResponse> {
    info!("tool call: {}", request.name);
    Json(dispatch_tool(&state, &request.name, &request.arguments).await)
}

async fn health_route() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_route))
        .route("/mcp/tools", get(list_tools_route))
        .route("/mcp/call", post(call_tool_route))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
