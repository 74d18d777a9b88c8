use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::VendorApiError;
use crate::core::types::{
    BrowserAction, CrawlSnapshot, CrawlState, Location, MapLink, ProxyMode, ScrapeFormat,
    SitemapMode, Strategy,
};

use super::{FetchClient, FetchOptions, FetchResult, VendorMetadata};

/// Grace added on top of the vendor-side timeout so the local HTTP call
/// does not fire first.
const HTTP_TIMEOUT_MARGIN_MS: u64 = 5_000;

/// Adapter to the external JS-rendering scrape service. Also carries the
/// map and crawl endpoints, which share the same error taxonomy.
pub struct VendorClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl VendorClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, api_key: api_key.into(), base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn classify_response(
        operation: &'static str,
        response: reqwest::Response,
    ) -> VendorApiError {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1_000);
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body)
            .trim()
            .to_string();
        let detail = if detail.is_empty() { format!("HTTP {}", status) } else { detail };

        let mut err = VendorApiError::new(operation, status, detail);
        if let Some(ms) = retry_after_ms {
            err.retry_after_ms = Some(ms);
        }
        err
    }

    /// URL discovery. Returns every link the vendor found (the caller
    /// windows the result).
    pub async fn map(&self, request: &VendorMapRequest) -> Result<Vec<MapLink>, VendorApiError> {
        let response = self
            .client
            .post(self.endpoint("map"))
            .bearer_auth(&self.api_key)
            .json(request)
            .timeout(Duration::from_millis(
                request.timeout.unwrap_or(60_000) + HTTP_TIMEOUT_MARGIN_MS,
            ))
            .send()
            .await
            .map_err(|e| VendorApiError::network("Map", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_response("Map", response).await);
        }

        let body: VendorMapResponse = response
            .json()
            .await
            .map_err(|e| VendorApiError::network("Map", format!("invalid response body: {}", e)))?;
        Ok(body.links.into_iter().map(MapLinkWire::into_link).collect())
    }

    pub async fn crawl_start(
        &self,
        request: &VendorCrawlRequest,
    ) -> Result<CrawlStarted, VendorApiError> {
        let response = self
            .client
            .post(self.endpoint("crawl"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| VendorApiError::network("Crawl", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_response("Crawl", response).await);
        }

        let body: CrawlStartedWire = response
            .json()
            .await
            .map_err(|e| VendorApiError::network("Crawl", format!("invalid response body: {}", e)))?;
        Ok(CrawlStarted { job_id: body.id, job_url: body.url })
    }

    pub async fn crawl_status(&self, job_id: &str) -> Result<CrawlSnapshot, VendorApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("crawl/{}", job_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VendorApiError::network("Crawl", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_response("Crawl", response).await);
        }

        let body: CrawlStatusWire = response
            .json()
            .await
            .map_err(|e| VendorApiError::network("Crawl", format!("invalid response body: {}", e)))?;
        Ok(body.into_snapshot(job_id))
    }

    pub async fn crawl_cancel(&self, job_id: &str) -> Result<CrawlState, VendorApiError> {
        let response = self
            .client
            .delete(self.endpoint(&format!("crawl/{}", job_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VendorApiError::network("Crawl", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_response("Crawl", response).await);
        }

        let body: CancelWire = response
            .json()
            .await
            .map_err(|e| VendorApiError::network("Crawl", format!("invalid response body: {}", e)))?;
        Ok(parse_state(&body.status))
    }
}

#[async_trait]
impl FetchClient for VendorClient {
    fn strategy(&self) -> Strategy {
        Strategy::Vendor
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        let request = VendorScrapeRequest::from_options(url, options);
        debug!("vendor scrape: {} formats={:?}", url, request.formats);

        let response = match self
            .client
            .post(self.endpoint("scrape"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(Duration::from_millis(options.timeout_ms + HTTP_TIMEOUT_MARGIN_MS))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return FetchResult::failed(Strategy::Vendor, None, e.to_string()),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let err = Self::classify_response("Scrape", response).await;
            return if matches!(status, 401 | 403) {
                FetchResult::auth_failed(Strategy::Vendor, Some(status), err.to_string())
            } else {
                FetchResult::failed(Strategy::Vendor, Some(status), err.to_string())
            };
        }

        let body: VendorScrapeResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                return FetchResult::failed(
                    Strategy::Vendor,
                    Some(status),
                    format!("invalid response body: {}", e),
                )
            }
        };

        if !body.success {
            let error = body.error.unwrap_or_else(|| "vendor reported failure".to_string());
            return if looks_like_auth_error(&error) {
                FetchResult::auth_failed(Strategy::Vendor, Some(status), error)
            } else {
                FetchResult::failed(Strategy::Vendor, Some(status), error)
            };
        }

        let Some(data) = body.data else {
            return FetchResult::failed(Strategy::Vendor, Some(status), "vendor returned no data");
        };

        let content = data
            .raw_html
            .clone()
            .or_else(|| data.html.clone())
            .or_else(|| data.markdown.clone())
            .unwrap_or_default();
        let doc_status = data.metadata.as_ref().and_then(|m| m.status_code);

        let metadata = VendorMetadata {
            title: data.metadata.as_ref().and_then(|m| m.title.clone()),
            description: data.metadata.as_ref().and_then(|m| m.description.clone()),
            source_url: data.metadata.as_ref().and_then(|m| m.source_url.clone()),
            status_code: doc_status,
            screenshot: data.screenshot,
            links: data.links,
            images: data.images,
            summary: data.summary,
            markdown: data.markdown,
        };

        let mut result = FetchResult::ok(Strategy::Vendor, content, doc_status.or(Some(status)));
        result.metadata = Some(metadata);
        result
    }
}

fn looks_like_auth_error(error: &str) -> bool {
    let lower = error.to_ascii_lowercase();
    lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid api key")
}

fn parse_state(raw: &str) -> CrawlState {
    match raw {
        "completed" => CrawlState::Completed,
        "failed" => CrawlState::Failed,
        "cancelled" => CrawlState::Cancelled,
        _ => CrawlState::Scraping,
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorScrapeRequest {
    pub url: String,
    pub formats: Vec<&'static str>,
    pub only_main_content: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
    pub timeout: u64,
    pub proxy: ProxyMode,
    pub block_ads: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<BrowserAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl VendorScrapeRequest {
    fn from_options(url: &str, options: &FetchOptions) -> Self {
        let mut formats: Vec<&'static str> =
            options.formats.iter().map(ScrapeFormat::as_str).collect();
        // The pipeline always needs markup to clean.
        if !formats.contains(&"rawHtml") && !formats.contains(&"html") {
            formats.push("html");
        }
        Self {
            url: url.to_string(),
            formats,
            only_main_content: options.only_main_content,
            include_tags: options.include_tags.clone(),
            exclude_tags: options.exclude_tags.clone(),
            headers: options.headers.clone(),
            wait_for: options.wait_for_ms,
            timeout: options.timeout_ms,
            proxy: options.proxy_mode,
            block_ads: options.block_ads,
            actions: options.actions.clone(),
            location: options.location.clone(),
        }
    }
}

#[derive(Deserialize)]
struct VendorScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<VendorScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    raw_html: Option<String>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    screenshot: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    metadata: Option<VendorDocMetadata>,
}

#[derive(Deserialize)]
struct VendorDocMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "sourceURL")]
    source_url: Option<String>,
    #[serde(default, rename = "statusCode")]
    status_code: Option<u16>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorMapRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub limit: usize,
    pub sitemap: SitemapMode,
    pub include_subdomains: bool,
    pub ignore_query_parameters: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Deserialize)]
struct VendorMapResponse {
    #[serde(default)]
    links: Vec<MapLinkWire>,
}

/// The vendor returns either bare URL strings or objects with metadata.
#[derive(Deserialize)]
#[serde(untagged)]
enum MapLinkWire {
    Url(String),
    Rich {
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl MapLinkWire {
    fn into_link(self) -> MapLink {
        match self {
            Self::Url(url) => MapLink { url, title: None, description: None },
            Self::Rich { url, title, description } => MapLink { url, title, description },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCrawlRequest {
    pub url: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discovery_depth: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    pub allow_subdomains: bool,
    pub crawl_entire_domain: bool,
    pub scrape_options: CrawlScrapeOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlScrapeOptions {
    pub formats: Vec<&'static str>,
    pub only_main_content: bool,
}

impl Default for CrawlScrapeOptions {
    fn default() -> Self {
        Self { formats: vec!["markdown", "html"], only_main_content: true }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlStarted {
    pub job_id: String,
    pub job_url: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStartedWire {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrawlStatusWire {
    status: String,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    completed: u64,
    #[serde(default)]
    credits_used: u64,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    next: Option<String>,
}

impl CrawlStatusWire {
    fn into_snapshot(self, job_id: &str) -> CrawlSnapshot {
        CrawlSnapshot {
            job_id: job_id.to_string(),
            status: parse_state(&self.status),
            total: self.total,
            completed: self.completed,
            credits_used: self.credits_used,
            expires_at: self.expires_at,
            error: self.error,
            data: self.data,
            next: self.next,
        }
    }
}

#[derive(Deserialize)]
struct CancelWire {
    status: String,
}
