use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::core::app_state::AppState;
use crate::core::types::{MapOptions, ResultHandling};
use crate::mcp::{ContentBlock, McpCallResponse};
use crate::tools::map::{map, MapOutcome};

pub async fn handle(state: &Arc<AppState>, arguments: &Value) -> McpCallResponse {
    let options: MapOptions = match serde_json::from_value(arguments.clone()) {
        Ok(options) => options,
        Err(e) => return McpCallResponse::error(format!("Invalid map arguments: {}", e)),
    };
    let result_handling = options.result_handling;

    match map(state, options).await {
        Ok(outcome) => render(outcome, result_handling),
        Err(e) => {
            error!("map failed: {}", e);
            McpCallResponse::error(e.to_string())
        }
    }
}

fn render(outcome: MapOutcome, result_handling: ResultHandling) -> McpCallResponse {
    let mut blocks = Vec::new();

    if result_handling != ResultHandling::SaveOnly {
        let body = serde_json::json!({
            "links": outcome.links,
            "total": outcome.total,
            "startIndex": outcome.start_index,
            "nextStartIndex": outcome.next_start_index,
        });
        blocks.push(ContentBlock::text(
            serde_json::to_string_pretty(&body).unwrap_or_else(|e| format!("serialization error: {}", e)),
        ));
    }

    if let Some(uri) = &outcome.uri {
        blocks.push(ContentBlock::ResourceLink {
            uri: uri.clone(),
            name: format!("map results ({} urls)", outcome.total),
            mime_type: "application/json".to_string(),
            description: None,
        });
    }

    if let Some(next) = outcome.next_start_index {
        blocks.push(ContentBlock::text(format!(
            "{} of {} urls shown. Continue with startIndex={}.",
            outcome.links.len(),
            outcome.total,
            next
        )));
    }

    McpCallResponse::blocks(blocks)
}
