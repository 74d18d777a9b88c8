use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::clean::{clean, is_html_like, CleanOptions};
use crate::core::app_state::AppState;
use crate::core::errors::{FetchDiagnostics, PulseError};
use crate::core::pagination::paginate;
use crate::core::types::{ResultHandling, ScrapeOptions, Strategy};
use crate::extract::Extractor;
use crate::store::{
    normalize_url, ResourceEntry, ResourceStore, Tier, TierWrite, WriteOutcome, WriteRequest,
};

/// Final result of the single-URL pipeline, ready for rendering as
/// content blocks. `payload` is already windowed; `uri` points at the
/// stored entry of the returned tier when one was persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutcome {
    pub url: String,
    pub tier: Tier,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Strategy>,
    pub total_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_start_index: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Per-attempt selector record for the fetch that produced this
    /// result. Absent on cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<FetchDiagnostics>,
}

/// Single-URL acquisition: cache lookup → strategy selection → clean →
/// extract → store → result handling → pagination. Cleaning, extraction
/// and storage failures are recovered locally and reported as warnings;
/// fetch failures surface with full diagnostics.
pub async fn scrape(state: &AppState, options: ScrapeOptions) -> Result<ScrapeOutcome, PulseError> {
    let normalized = normalize_url(&options.url)?;
    let extract_query = options.extract_query().map(str::to_string);

    if extract_query.is_some() && state.extractor.is_none() {
        return Err(PulseError::Input(
            "extraction requested but no LLM provider is configured (set LLM_PROVIDER)".to_string(),
        ));
    }

    // Screenshot requests always go back to the network.
    if !options.force_rescrape && !options.wants_screenshot() {
        if let Some(entry) = cache_lookup(state, &normalized, extract_query.as_deref(), &options).await? {
            info!("cache hit for {} ({} tier)", normalized, entry.tier);
            return Ok(render_entry(entry, &options));
        }
    }

    let fetch_options = fetch_options(&options);
    let selected = {
        let _permit = state
            .outbound_limit
            .acquire()
            .await
            .map_err(|_| PulseError::Job("service is shutting down".to_string()))?;
        state.selector.fetch(&normalized, &fetch_options).await?
    };

    let mut warnings = Vec::new();
    let diagnostics = selected.diagnostics;
    let source = selected.result.source;
    let raw_content = selected.result.content;
    let metadata = selected.result.metadata.unwrap_or_default();

    let raw_is_html = is_html_like(&raw_content);
    let base_url = Url::parse(&normalized)
        .map_err(|e| PulseError::Input(format!("invalid URL `{}`: {}", normalized, e)))?;

    let cleaned = if options.clean_scrape && raw_is_html {
        match clean(
            &raw_content,
            &base_url,
            &CleanOptions {
                include_selectors: options.include_tags.clone(),
                exclude_selectors: options.exclude_tags.clone(),
                only_main_content: options.only_main_content,
            },
        ) {
            Ok(markdown) => Some(markdown),
            Err(e) => {
                warn!("cleaning failed for {}: {} — keeping raw content", normalized, e);
                warnings.push(format!("content_cleaning_failed: {}", e));
                None
            }
        }
    } else {
        None
    };

    let extracted = match (&extract_query, &state.extractor) {
        (Some(query), Some(extractor)) => {
            let input = cleaned.as_deref().unwrap_or(&raw_content);
            match extractor.extract(input, query).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("extraction failed for {}: {} — keeping cleaned content", normalized, e);
                    warnings.push(format!("extraction_failed: {}", e));
                    None
                }
            }
        }
        _ => None,
    };

    let mut stored = WriteOutcome::default();
    if options.result_handling != ResultHandling::ReturnOnly {
        let request = WriteRequest {
            url: normalized.clone(),
            extract_query: extract_query.clone(),
            actions: options.actions.clone(),
            raw: Some(TierWrite {
                payload: raw_content.clone(),
                mime_type: if raw_is_html { "text/html" } else { "text/plain" }.to_string(),
            }),
            cleaned: cleaned.clone(),
            extracted: extracted.clone(),
        };
        match state.store.write_multi(request).await {
            Ok(outcome) => {
                for tier_error in &outcome.tier_errors {
                    warnings.push(format!("storage_tier_failed: {}", tier_error));
                }
                stored = outcome;
            }
            Err(e) => {
                warn!("storage failed for {}: {} — returning in-memory result", normalized, e);
                warnings.push(format!("storage_failed: {}", e));
            }
        }
    }

    let (tier, full_payload, mime_type) = match (&extracted, &cleaned) {
        (Some(text), _) => (Tier::Extracted, text.clone(), "text/plain"),
        (None, Some(markdown)) => (Tier::Cleaned, markdown.clone(), "text/markdown"),
        (None, None) => (
            Tier::Raw,
            raw_content.clone(),
            if raw_is_html { "text/html" } else { "text/plain" },
        ),
    };

    let window = paginate(&full_payload, options.start_index, options.max_chars);
    if window.next_start_index.is_some() {
        warnings.push("content_truncated".to_string());
    }

    Ok(ScrapeOutcome {
        url: normalized,
        tier,
        mime_type: mime_type.to_string(),
        payload: match options.result_handling {
            ResultHandling::SaveOnly => None,
            _ => Some(window.text),
        },
        uri: stored.uri_for(tier).map(str::to_string),
        from_cache: false,
        source: Some(source),
        total_chars: window.total_chars,
        next_start_index: window.next_start_index,
        warnings,
        screenshot: metadata.screenshot,
        links: metadata.links,
        images: metadata.images,
        summary: metadata.summary,
        diagnostics: Some(diagnostics),
    })
}

async fn cache_lookup(
    state: &AppState,
    normalized: &str,
    extract_query: Option<&str>,
    options: &ScrapeOptions,
) -> Result<Option<ResourceEntry>, PulseError> {
    let entries = state
        .store
        .find_by_url_and_extract(normalized, extract_query, &options.actions)
        .await?;

    let preferred = if extract_query.is_some() {
        Tier::Extracted
    } else if options.clean_scrape {
        Tier::Cleaned
    } else {
        Tier::Raw
    };

    let now = Utc::now();
    Ok(entries
        .into_iter()
        .find(|entry| entry.tier == preferred && entry.age_ms(now) <= options.max_age))
}

fn render_entry(entry: ResourceEntry, options: &ScrapeOptions) -> ScrapeOutcome {
    let window = paginate(&entry.payload, options.start_index, options.max_chars);
    let mut warnings = Vec::new();
    if window.next_start_index.is_some() {
        warnings.push("content_truncated".to_string());
    }
    ScrapeOutcome {
        url: entry.url,
        tier: entry.tier,
        mime_type: entry.mime_type,
        payload: match options.result_handling {
            ResultHandling::SaveOnly => None,
            _ => Some(window.text),
        },
        uri: Some(entry.uri),
        from_cache: true,
        source: None,
        total_chars: window.total_chars,
        next_start_index: window.next_start_index,
        warnings,
        screenshot: None,
        links: Vec::new(),
        images: Vec::new(),
        summary: None,
        diagnostics: None,
    }
}

fn fetch_options(options: &ScrapeOptions) -> crate::fetch::FetchOptions {
    crate::fetch::FetchOptions {
        timeout_ms: options.timeout,
        headers: options.headers.clone(),
        wait_for_ms: options.wait_for,
        proxy_mode: options.proxy,
        block_ads: options.block_ads,
        actions: options.actions.clone(),
        include_tags: options.include_tags.clone(),
        exclude_tags: options.exclude_tags.clone(),
        formats: options.formats.clone(),
        only_main_content: options.only_main_content,
        location: options.location.clone(),
    }
}
