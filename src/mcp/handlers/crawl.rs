use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::core::app_state::AppState;
use crate::core::errors::PulseError;
use crate::core::types::CrawlStartOptions;
use crate::mcp::{ContentBlock, McpCallResponse};

/// One consolidated entry point with XOR inputs: `url` starts a job,
/// `jobId` polls it, `jobId` + `cancel` cancels it.
pub async fn handle(state: &Arc<AppState>, arguments: &Value) -> McpCallResponse {
    let url = arguments.get("url").and_then(Value::as_str);
    let job_id = arguments.get("jobId").and_then(Value::as_str);
    let cancel = arguments.get("cancel").and_then(Value::as_bool).unwrap_or(false);

    let result = match (url, job_id) {
        (Some(_), Some(_)) => Err(PulseError::Input(
            "provide either `url` (start a job) or `jobId` (poll/cancel), not both".to_string(),
        )),
        (None, None) => Err(PulseError::Input(
            "provide `url` to start a job or `jobId` to poll/cancel one".to_string(),
        )),
        (Some(_), None) if cancel => Err(PulseError::Input(
            "`cancel` requires `jobId`, not `url`".to_string(),
        )),
        (Some(_), None) => start(state, arguments).await,
        (None, Some(id)) if cancel => cancel_job(state, id).await,
        (None, Some(id)) => status(state, id).await,
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            error!("crawl call failed: {}", e);
            McpCallResponse::error(e.to_string())
        }
    }
}

async fn start(state: &Arc<AppState>, arguments: &Value) -> Result<McpCallResponse, PulseError> {
    // The lifecycle keys are consumed by the XOR dispatch above.
    let mut start_args = arguments.clone();
    if let Some(object) = start_args.as_object_mut() {
        object.remove("jobId");
        object.remove("cancel");
    }
    let options: CrawlStartOptions = serde_json::from_value(start_args)
        .map_err(|e| PulseError::Input(format!("Invalid crawl arguments: {}", e)))?;
    let started = state.crawler.start(options).await?;

    let body = serde_json::json!({
        "jobId": started.job_id,
        "jobUrl": started.job_url,
        "status": "scraping",
    });
    Ok(McpCallResponse::text(
        serde_json::to_string_pretty(&body).unwrap_or_else(|e| format!("serialization error: {}", e)),
    ))
}

async fn status(state: &Arc<AppState>, job_id: &str) -> Result<McpCallResponse, PulseError> {
    let snapshot = state.crawler.status(job_id).await?;
    let mut blocks = vec![ContentBlock::text(
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|e| format!("serialization error: {}", e)),
    )];
    if let Some(next) = &snapshot.next {
        blocks.push(ContentBlock::text(format!("More results available: {}", next)));
    }
    Ok(McpCallResponse::blocks(blocks))
}

async fn cancel_job(state: &Arc<AppState>, job_id: &str) -> Result<McpCallResponse, PulseError> {
    let snapshot = state.crawler.cancel(job_id).await?;
    let body = serde_json::json!({ "jobId": snapshot.job_id, "status": snapshot.status });
    Ok(McpCallResponse::text(
        serde_json::to_string_pretty(&body).unwrap_or_else(|e| format!("serialization error: {}", e)),
    ))
}
