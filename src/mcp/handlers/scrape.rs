use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::error;

use crate::core::app_state::AppState;
use crate::core::types::{ResultHandling, ScrapeOptions};
use crate::mcp::{ContentBlock, EmbeddedResource, McpCallResponse};
use crate::tools::scrape::{scrape, ScrapeOutcome};

pub async fn handle(state: &Arc<AppState>, arguments: &Value) -> McpCallResponse {
    let options: ScrapeOptions = match serde_json::from_value(arguments.clone()) {
        Ok(options) => options,
        Err(e) => return McpCallResponse::error(format!("Invalid scrape arguments: {}", e)),
    };
    let result_handling = options.result_handling;

    match scrape(state, options).await {
        Ok(outcome) => render(outcome, result_handling),
        Err(e) => {
            error!("scrape failed: {}", e);
            McpCallResponse::error(e.to_string())
        }
    }
}

fn render(outcome: ScrapeOutcome, result_handling: ResultHandling) -> McpCallResponse {
    let mut blocks = Vec::new();

    match result_handling {
        ResultHandling::SaveAndReturn => match &outcome.uri {
            Some(uri) => blocks.push(ContentBlock::Resource {
                resource: EmbeddedResource {
                    uri: uri.clone(),
                    mime_type: outcome.mime_type.clone(),
                    name: Some(outcome.url.clone()),
                    text: outcome.payload.clone(),
                },
            }),
            // Storage failed: the payload still goes back inline.
            None => blocks.push(ContentBlock::text(outcome.payload.clone().unwrap_or_default())),
        },
        ResultHandling::SaveOnly => match &outcome.uri {
            Some(uri) => blocks.push(ContentBlock::ResourceLink {
                uri: uri.clone(),
                name: outcome.url.clone(),
                mime_type: outcome.mime_type.clone(),
                description: Some(format!("{} tier, {} chars", outcome.tier, outcome.total_chars)),
            }),
            None => blocks.push(ContentBlock::text(
                "Scrape succeeded but nothing could be persisted; re-run with resultHandling=returnOnly to read the content.",
            )),
        },
        ResultHandling::ReturnOnly => {
            blocks.push(ContentBlock::text(outcome.payload.clone().unwrap_or_default()))
        }
    }

    if let Some(screenshot) = &outcome.screenshot {
        // The vendor returns either hosted screenshot URLs or inline
        // base64 bytes; only the latter can become an image block.
        if STANDARD.decode(screenshot).is_ok() {
            blocks.push(ContentBlock::Image {
                data: screenshot.clone(),
                mime_type: "image/png".to_string(),
            });
        } else {
            blocks.push(ContentBlock::text(format!("Screenshot: {}", screenshot)));
        }
    }

    if !outcome.links.is_empty() {
        blocks.push(ContentBlock::text(format!("Links found:\n{}", outcome.links.join("\n"))));
    }
    if !outcome.images.is_empty() {
        blocks.push(ContentBlock::text(format!("Images found:\n{}", outcome.images.join("\n"))));
    }
    if let Some(summary) = &outcome.summary {
        blocks.push(ContentBlock::text(format!("Summary: {}", summary)));
    }

    if let Some(next) = outcome.next_start_index {
        blocks.push(ContentBlock::text(format!(
            "Content truncated ({} chars total). Continue with startIndex={}.",
            outcome.total_chars, next
        )));
    }
    if !outcome.warnings.is_empty() {
        blocks.push(ContentBlock::text(format!("Warnings: {}", outcome.warnings.join("; "))));
    }

    McpCallResponse::blocks(blocks)
}
