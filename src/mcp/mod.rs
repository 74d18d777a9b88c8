//! Tool surface consumed by an external MCP dispatcher: the tool catalog,
//! content-block response types, and the two transports (axum HTTP and a
//! stdio JSON-RPC loop).

pub mod handlers;
pub mod http;
pub mod stdio;
pub mod tooling;

use serde::{Deserialize, Serialize};

pub use http::{router, McpCallRequest, McpCallResponse, McpTool, McpToolsResponse};

/// One element of a tool response. Errors are never thrown across this
/// boundary; they arrive as a text block with `isError` set on the
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
    ResourceLink {
        uri: String,
        name: String,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub uri: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_serialize_with_protocol_tags() {
        let block = ContentBlock::text("hello");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "text", "text": "hello" }));

        let link = ContentBlock::ResourceLink {
            uri: "pulse-fetch://scraped/cleaned/test.com-aa".to_string(),
            name: "https://test.com".to_string(),
            mime_type: "text/markdown".to_string(),
            description: None,
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["type"], "resource_link");
        assert_eq!(json["mimeType"], "text/markdown");
        assert!(json.get("description").is_none());
    }
}
