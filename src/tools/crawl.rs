use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::core::errors::{PulseError, VendorApiError, VendorErrorKind};
use crate::core::types::{CrawlSnapshot, CrawlStartOptions, CrawlState};
use crate::fetch::vendor::{CrawlScrapeOptions, CrawlStarted, VendorClient, VendorCrawlRequest};
use crate::store::normalize_url;

const DEFAULT_CRAWL_LIMIT: usize = 100;
const MAX_CRAWL_LIMIT: usize = 100_000;
const DEFAULT_DISCOVERY_DEPTH: usize = 3;

/// Serialized size budget for one status page of per-URL results.
const PAGE_BUDGET_BYTES: usize = 10 * 1024 * 1024;

/// Local face of upstream-owned crawl jobs. The upstream service owns all
/// job state; this proxy holds last-known snapshots so terminal states
/// never regress and cancelling a finished job stays idempotent.
pub struct CrawlProxy {
    vendor: Option<Arc<VendorClient>>,
    jobs: RwLock<HashMap<String, CrawlSnapshot>>,
}

impl CrawlProxy {
    pub fn new(vendor: Option<Arc<VendorClient>>) -> Self {
        Self { vendor, jobs: RwLock::new(HashMap::new()) }
    }

    fn vendor(&self) -> Result<&Arc<VendorClient>, PulseError> {
        self.vendor.as_ref().ok_or_else(|| {
            PulseError::Job("crawling requires the vendor API (set VENDOR_API_KEY)".to_string())
        })
    }

    pub async fn start(&self, options: CrawlStartOptions) -> Result<CrawlStarted, PulseError> {
        let normalized = normalize_url(&options.url)?;
        let limit = options.limit.unwrap_or(DEFAULT_CRAWL_LIMIT);
        if !(1..=MAX_CRAWL_LIMIT).contains(&limit) {
            return Err(PulseError::Input(format!(
                "limit must be between 1 and {} (got {})",
                MAX_CRAWL_LIMIT, limit
            )));
        }

        let request = build_crawl_request(&normalized, limit, &options);
        let started = self.vendor()?.crawl_start(&request).await?;
        info!("crawl {} started for {}", started.job_id, normalized);

        self.jobs.write().await.insert(
            started.job_id.clone(),
            CrawlSnapshot {
                job_id: started.job_id.clone(),
                status: CrawlState::Scraping,
                total: 0,
                completed: 0,
                credits_used: 0,
                expires_at: None,
                error: None,
                data: Vec::new(),
                next: None,
            },
        );
        Ok(started)
    }

    pub async fn status(&self, job_id: &str) -> Result<CrawlSnapshot, PulseError> {
        let vendor = self.vendor()?;
        let mut snapshot = vendor
            .crawl_status(job_id)
            .await
            .map_err(|e| job_error(job_id, e))?;

        // Terminal states are sticky: a stale upstream read never
        // resurrects a finished job.
        if let Some(local) = self.jobs.read().await.get(job_id) {
            if local.status.is_terminal() && !snapshot.status.is_terminal() {
                warn!(
                    "upstream reports {} for terminal job {} — keeping {}",
                    snapshot.status.as_str(),
                    job_id,
                    local.status.as_str()
                );
                snapshot.status = local.status;
            }
        }

        apply_page_budget(&mut snapshot);
        self.remember(&snapshot).await;
        Ok(snapshot)
    }

    /// Idempotent: cancelling a job already in a terminal state returns
    /// that state unchanged.
    pub async fn cancel(&self, job_id: &str) -> Result<CrawlSnapshot, PulseError> {
        if let Some(local) = self.jobs.read().await.get(job_id) {
            if local.status.is_terminal() {
                return Ok(local.clone());
            }
        }

        let vendor = self.vendor()?;
        let state = vendor
            .crawl_cancel(job_id)
            .await
            .map_err(|e| job_error(job_id, e))?;

        let snapshot = CrawlSnapshot {
            job_id: job_id.to_string(),
            status: state,
            total: 0,
            completed: 0,
            credits_used: 0,
            expires_at: None,
            error: None,
            data: Vec::new(),
            next: None,
        };
        self.remember(&snapshot).await;
        info!("crawl {} cancelled", job_id);
        Ok(snapshot)
    }

    /// Keep a data-free copy; payloads are served per status call, not
    /// retained.
    async fn remember(&self, snapshot: &CrawlSnapshot) {
        let mut light = snapshot.clone();
        light.data = Vec::new();
        self.jobs.write().await.insert(snapshot.job_id.clone(), light);
    }
}

fn job_error(job_id: &str, error: VendorApiError) -> PulseError {
    if error.kind == VendorErrorKind::NotFound {
        return PulseError::Job(format!(
            "crawl job `{}` is unknown (expired, never started, or belongs to another account)",
            job_id
        ));
    }
    PulseError::Vendor(error)
}

/// Truncate the per-URL result page to the serialized budget; `next`
/// signals a continuation whenever results were withheld.
fn apply_page_budget(snapshot: &mut CrawlSnapshot) {
    let mut used = 0usize;
    let mut kept = 0usize;
    for item in &snapshot.data {
        let size = serde_json::to_string(item).map(|s| s.len()).unwrap_or(0);
        if used + size > PAGE_BUDGET_BYTES {
            break;
        }
        used += size;
        kept += 1;
    }
    if kept < snapshot.data.len() {
        let withheld = snapshot.data.len() - kept;
        snapshot.data.truncate(kept);
        if snapshot.next.is_none() {
            snapshot.next = Some(format!("{} results withheld by the 10 MB page budget", withheld));
        }
    }
}

// ---------------------------------------------------------------------------
// Per-host crawl config
// ---------------------------------------------------------------------------

struct HostProfile {
    include: &'static [&'static str],
    depth: usize,
}

/// Hosts with a known-good shape get tighter defaults: docs sites keep a
/// single language prefix so a crawl does not burn its budget on
/// translations.
fn host_profile(host: &str) -> Option<HostProfile> {
    match host {
        "developer.mozilla.org" => Some(HostProfile { include: &["/en-US/docs/*"], depth: 5 }),
        "docs.python.org" => Some(HostProfile { include: &["/3/*"], depth: 4 }),
        "en.wikipedia.org" => Some(HostProfile { include: &["/wiki/*"], depth: 3 }),
        _ => None,
    }
}

/// Baseline excludes for hosts without a profile: account chrome,
/// transactional paths, and binary assets.
fn universal_excludes() -> Vec<String> {
    [
        "/login", "/logout", "/signup", "/signin", "/register", "/cart", "/checkout", "/admin",
        "/api/", "*.pdf", "*.zip", "*.exe", "*.dmg", "*.tar", "*.gz", "*.mp4", "*.mp3", "*.avi",
        "*.mov", "*.jpg", "*.jpeg", "*.png", "*.gif", "*.svg", "*.webp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn build_crawl_request(
    normalized: &str,
    limit: usize,
    options: &CrawlStartOptions,
) -> VendorCrawlRequest {
    let host = Url::parse(normalized)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();
    let profile = host_profile(&host);

    let include_paths = if !options.include_paths.is_empty() {
        options.include_paths.clone()
    } else {
        profile
            .as_ref()
            .map(|p| p.include.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    };
    let exclude_paths = if !options.exclude_paths.is_empty() {
        options.exclude_paths.clone()
    } else if profile.is_some() {
        Vec::new()
    } else {
        universal_excludes()
    };
    let depth = options
        .max_discovery_depth
        .unwrap_or_else(|| profile.as_ref().map(|p| p.depth).unwrap_or(DEFAULT_DISCOVERY_DEPTH));

    VendorCrawlRequest {
        url: normalized.to_string(),
        limit,
        max_discovery_depth: Some(depth),
        include_paths,
        exclude_paths,
        allow_subdomains: options.allow_subdomains,
        crawl_entire_domain: options.crawl_entire_domain,
        scrape_options: CrawlScrapeOptions::default(),
    }
}
