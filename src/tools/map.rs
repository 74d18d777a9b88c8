use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::app_state::AppState;
use crate::core::errors::PulseError;
use crate::core::types::{Location, MapLink, MapOptions, ResultHandling};
use crate::fetch::vendor::VendorMapRequest;
use crate::store::{domain_of, normalize_url, ResourceEntry, ResourceStore, Tier};

const MAX_DISCOVERY_LIMIT: usize = 100_000;

/// A window over the discovered URL set. `uri` is present when the full
/// set was persisted; `links` is empty in save-only mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOutcome {
    pub links: Vec<MapLink>,
    pub total: usize,
    pub start_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_start_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// URL enumeration from a seed page, windowed by `startIndex`/`maxResults`
/// and optionally persisted as one resource per page of the window size.
pub async fn map(state: &AppState, options: MapOptions) -> Result<MapOutcome, PulseError> {
    let normalized = normalize_url(&options.url)?;

    if !(1..=MAX_DISCOVERY_LIMIT).contains(&options.limit) {
        return Err(PulseError::Input(format!(
            "limit must be between 1 and {} (got {})",
            MAX_DISCOVERY_LIMIT, options.limit
        )));
    }
    let max_results = options.max_results.unwrap_or(state.config.map_max_results_per_page);
    if !(1..=5_000).contains(&max_results) {
        return Err(PulseError::Input(format!(
            "maxResults must be between 1 and 5000 (got {})",
            max_results
        )));
    }

    let Some(vendor) = state.vendor.as_ref() else {
        return Err(PulseError::Input(
            "URL discovery requires the vendor API (set VENDOR_API_KEY)".to_string(),
        ));
    };

    let location = options.location.clone().or_else(|| default_location(state));
    let request = VendorMapRequest {
        url: normalized.clone(),
        search: options.search.clone(),
        limit: options.limit,
        sitemap: options.sitemap,
        include_subdomains: options.include_subdomains,
        ignore_query_parameters: options.ignore_query_parameters,
        timeout: options.timeout,
        location,
    };

    let links = {
        let _permit = state
            .outbound_limit
            .acquire()
            .await
            .map_err(|_| PulseError::Job("service is shutting down".to_string()))?;
        vendor.map(&request).await?
    };
    let total = links.len();
    info!("map discovered {} urls for {}", total, normalized);

    let window: Vec<MapLink> = links
        .iter()
        .skip(options.start_index)
        .take(max_results)
        .cloned()
        .collect();
    let end = options.start_index + max_results;
    let next_start_index = (end < total).then_some(end);

    let uri = if options.result_handling != ResultHandling::ReturnOnly {
        persist_page(state, &normalized, &links, options.start_index, max_results).await
    } else {
        None
    };

    Ok(MapOutcome {
        links: match options.result_handling {
            ResultHandling::SaveOnly => Vec::new(),
            _ => window,
        },
        total,
        start_index: options.start_index,
        next_start_index,
        uri,
    })
}

fn default_location(state: &AppState) -> Option<Location> {
    let country = state.config.map_default_country.clone();
    let languages = state.config.map_default_languages.clone();
    if country.is_none() && languages.is_empty() {
        return None;
    }
    Some(Location { country, languages })
}

/// Persist the full discovered set under
/// `pulse-crawl://map/{hostname}/{timestamp}/page-{n}` where
/// `n = startIndex / maxResults`.
async fn persist_page(
    state: &AppState,
    normalized: &str,
    links: &[MapLink],
    start_index: usize,
    max_results: usize,
) -> Option<String> {
    let host = domain_of(normalized);
    let timestamp = Utc::now().timestamp();
    let page = start_index / max_results.max(1);
    let uri = format!("pulse-crawl://map/{}/{}/page-{}", host, timestamp, page);

    let payload = match serde_json::to_string_pretty(links) {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to serialize map results: {}", e);
            return None;
        }
    };

    let entry = ResourceEntry {
        uri: uri.clone(),
        url: normalized.to_string(),
        mime_type: "application/json".to_string(),
        created_at: Utc::now(),
        fingerprint: format!("{}-{}-page-{}", host, timestamp, page),
        tier: Tier::Map,
        payload,
        links: None,
    };

    match state.store.write_entry(entry).await {
        Ok(uri) => Some(uri),
        Err(e) => {
            warn!("failed to persist map results: {} — returning inline only", e);
            None
        }
    }
}
