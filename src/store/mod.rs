//! Content-addressed resource store.
//!
//! Every successful scrape is projected into up to three tiers (raw,
//! cleaned, extracted) stored under one fingerprint; map result pages are
//! persisted through the same store under their own URI scheme. Entries are
//! immutable: re-writes replace atomically, and age policy is applied by
//! readers, never by eviction here.

pub mod filesystem;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::core::errors::PulseError;
use crate::core::types::BrowserAction;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

pub const SCRAPED_URI_PREFIX: &str = "pulse-fetch://scraped/";
pub const MAP_URI_PREFIX: &str = "pulse-crawl://map/";

/// Storage projection of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Cleaned,
    Extracted,
    Map,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Cleaned => "cleaned",
            Self::Extracted => "extracted",
            Self::Map => "map",
        }
    }

    /// Preference order when picking a cache hit: the most refined tier wins.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Extracted => 0,
            Self::Cleaned => 1,
            Self::Raw => 2,
            Self::Map => 3,
        }
    }

    pub const SCRAPED: [Tier; 3] = [Tier::Raw, Tier::Cleaned, Tier::Extracted];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sibling-tier adjacency. Three optional URIs, not a live graph; the
/// store remains the single source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<String>,
}

impl TierLinks {
    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.cleaned.is_none() && self.extracted.is_none()
    }
}

/// An immutable stored record. Serialized verbatim as the on-disk file
/// format of the filesystem backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: String,
    pub url: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
    pub tier: Tier,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<TierLinks>,
}

impl ResourceEntry {
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.created_at).num_milliseconds().max(0) as u64
    }
}

/// One tier's payload in a multi-tier write.
#[derive(Debug, Clone)]
pub struct TierWrite {
    pub payload: String,
    pub mime_type: String,
}

/// A multi-tier write under one fingerprint.
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    /// Normalized source URL.
    pub url: String,
    pub extract_query: Option<String>,
    pub actions: Vec<BrowserAction>,
    pub raw: Option<TierWrite>,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
}

impl WriteRequest {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.url, self.extract_query.as_deref(), &self.actions)
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.cleaned.is_none() && self.extracted.is_none()
    }
}

/// Per-tier URIs of a completed write. Tiers that failed are reported in
/// `tier_errors`; the write as a whole errors only when every tier failed.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub raw_uri: Option<String>,
    pub cleaned_uri: Option<String>,
    pub extracted_uri: Option<String>,
    pub tier_errors: Vec<String>,
}

impl WriteOutcome {
    pub fn uri_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Raw => self.raw_uri.as_deref(),
            Tier::Cleaned => self.cleaned_uri.as_deref(),
            Tier::Extracted => self.extracted_uri.as_deref(),
            Tier::Map => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ResourceEntry>,
    pub next_cursor: Option<String>,
}

/// Storage backend contract. Implementations serialize concurrent writers
/// per fingerprint and never let readers observe a torn record.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Write all supplied tiers under one fingerprint, populating sibling
    /// links. Fails only if every attempted tier failed.
    async fn write_multi(&self, req: WriteRequest) -> Result<WriteOutcome, PulseError>;

    /// Write a single pre-built entry (map result pages).
    async fn write_entry(&self, entry: ResourceEntry) -> Result<String, PulseError>;

    /// Cache lookup: all live entries under the fingerprint of
    /// (url, extract query, actions), most refined and newest first.
    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
        actions: &[BrowserAction],
    ) -> Result<Vec<ResourceEntry>, PulseError>;

    async fn read(&self, uri: &str) -> Result<Option<ResourceEntry>, PulseError>;

    async fn list(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, PulseError>;
}

// ---------------------------------------------------------------------------
// URL normalization and fingerprinting
// ---------------------------------------------------------------------------

/// Canonicalize a URL for cache identity: http(s) only, fragment dropped,
/// query pairs sorted so parameter order never splits the cache.
pub fn normalize_url(raw: &str) -> Result<String, PulseError> {
    let mut parsed = Url::parse(raw.trim())
        .map_err(|e| PulseError::Input(format!("invalid URL `{}`: {}", raw.trim(), e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PulseError::Input(format!(
            "invalid URL `{}`: only http:// and https:// are supported",
            raw.trim()
        )));
    }
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        let query = pairs
            .iter()
            .fold(url::form_urlencoded::Serializer::new(String::new()), |mut s, (k, v)| {
                s.append_pair(k, v);
                s
            })
            .finish();
        parsed.set_query(Some(&query));
    }
    Ok(parsed.to_string())
}

pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Stable cache key: `<domain>-<sha256[..16 hex]>` over the normalized URL,
/// the extract query, and the canonical action-list JSON. Stable across
/// processes and releases; any identity input change is a cache miss.
pub fn fingerprint(normalized_url: &str, extract_query: Option<&str>, actions: &[BrowserAction]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"?extract=");
    hasher.update(extract_query.map(str::trim).unwrap_or("").as_bytes());
    hasher.update(b"&actions=");
    if !actions.is_empty() {
        hasher.update(serde_json::to_string(actions).unwrap_or_default().as_bytes());
    }
    let digest = hasher.finalize();
    format!("{}-{}", domain_of(normalized_url), hex::encode(&digest[..8]))
}

pub fn scraped_uri(tier: Tier, fingerprint: &str) -> String {
    format!("{}{}/{}", SCRAPED_URI_PREFIX, tier.as_str(), fingerprint)
}

/// Map a URI of either scheme onto (tier, file key). The map scheme embeds
/// hostname/timestamp/page, flattened into one key for single-file storage.
pub fn uri_to_location(uri: &str) -> Option<(Tier, String)> {
    if let Some(rest) = uri.strip_prefix(SCRAPED_URI_PREFIX) {
        let (tier, key) = rest.split_once('/')?;
        let tier = match tier {
            "raw" => Tier::Raw,
            "cleaned" => Tier::Cleaned,
            "extracted" => Tier::Extracted,
            _ => return None,
        };
        if key.is_empty() || key.contains('/') {
            return None;
        }
        return Some((tier, key.to_string()));
    }
    if let Some(rest) = uri.strip_prefix(MAP_URI_PREFIX) {
        let mut parts = rest.split('/');
        let host = parts.next()?;
        let timestamp = parts.next()?;
        let page = parts.next()?;
        if host.is_empty() || timestamp.is_empty() || !page.starts_with("page-") || parts.next().is_some() {
            return None;
        }
        return Some((Tier::Map, format!("{}-{}-{}", host, timestamp, page)));
    }
    None
}

/// Build the entry set for a multi-tier write, cross-linking siblings.
pub fn build_entries(req: &WriteRequest, now: DateTime<Utc>) -> (String, Vec<ResourceEntry>) {
    let fingerprint = req.fingerprint();

    let mut uris: BTreeMap<Tier, String> = BTreeMap::new();
    if req.raw.is_some() {
        uris.insert(Tier::Raw, scraped_uri(Tier::Raw, &fingerprint));
    }
    if req.cleaned.is_some() {
        uris.insert(Tier::Cleaned, scraped_uri(Tier::Cleaned, &fingerprint));
    }
    if req.extracted.is_some() {
        uris.insert(Tier::Extracted, scraped_uri(Tier::Extracted, &fingerprint));
    }

    let links_for = |own: Tier| -> Option<TierLinks> {
        let links = TierLinks {
            raw: uris.get(&Tier::Raw).filter(|_| own != Tier::Raw).cloned(),
            cleaned: uris.get(&Tier::Cleaned).filter(|_| own != Tier::Cleaned).cloned(),
            extracted: uris.get(&Tier::Extracted).filter(|_| own != Tier::Extracted).cloned(),
        };
        (!links.is_empty()).then_some(links)
    };

    let mut entries = Vec::new();
    if let Some(raw) = &req.raw {
        entries.push(ResourceEntry {
            uri: uris[&Tier::Raw].clone(),
            url: req.url.clone(),
            mime_type: raw.mime_type.clone(),
            created_at: now,
            fingerprint: fingerprint.clone(),
            tier: Tier::Raw,
            payload: raw.payload.clone(),
            links: links_for(Tier::Raw),
        });
    }
    if let Some(cleaned) = &req.cleaned {
        entries.push(ResourceEntry {
            uri: uris[&Tier::Cleaned].clone(),
            url: req.url.clone(),
            mime_type: "text/markdown".to_string(),
            created_at: now,
            fingerprint: fingerprint.clone(),
            tier: Tier::Cleaned,
            payload: cleaned.clone(),
            links: links_for(Tier::Cleaned),
        });
    }
    if let Some(extracted) = &req.extracted {
        entries.push(ResourceEntry {
            uri: uris[&Tier::Extracted].clone(),
            url: req.url.clone(),
            mime_type: "text/plain".to_string(),
            created_at: now,
            fingerprint: fingerprint.clone(),
            tier: Tier::Extracted,
            payload: extracted.clone(),
            links: links_for(Tier::Extracted),
        });
    }

    (fingerprint, entries)
}

/// Newest first, most refined tier first on ties.
pub fn sort_entries(entries: &mut [ResourceEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.tier.rank().cmp(&b.tier.rank()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_domain_prefixed() {
        let url = normalize_url("https://test.com/page").unwrap();
        let a = fingerprint(&url, None, &[]);
        let b = fingerprint(&url, None, &[]);
        assert_eq!(a, b);
        assert!(a.starts_with("test.com-"), "{}", a);
        assert_eq!(a.len(), "test.com-".len() + 16);
    }

    #[test]
    fn case_equivalent_urls_share_a_fingerprint() {
        let a = normalize_url("HTTPS://Test.COM/page").unwrap();
        let b = normalize_url("https://test.com/page").unwrap();
        assert_eq!(fingerprint(&a, None, &[]), fingerprint(&b, None, &[]));
    }

    #[test]
    fn query_parameter_order_does_not_split_the_cache() {
        let a = normalize_url("https://test.com/p?b=2&a=1").unwrap();
        let b = normalize_url("https://test.com/p?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identity_inputs_change_the_fingerprint() {
        let url = normalize_url("https://test.com/page").unwrap();
        let base = fingerprint(&url, None, &[]);
        assert_ne!(base, fingerprint(&url, Some("title"), &[]));

        let action: BrowserAction =
            serde_json::from_value(serde_json::json!({"type": "scroll", "pixels": 500})).unwrap();
        assert_ne!(base, fingerprint(&url, None, &[action]));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(normalize_url("ftp://test.com/x").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn fragments_are_dropped() {
        let a = normalize_url("https://test.com/p#section").unwrap();
        let b = normalize_url("https://test.com/p").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uri_round_trips_to_location() {
        let fp = "test.com-0011223344556677";
        let uri = scraped_uri(Tier::Cleaned, fp);
        assert_eq!(uri, "pulse-fetch://scraped/cleaned/test.com-0011223344556677");
        assert_eq!(uri_to_location(&uri), Some((Tier::Cleaned, fp.to_string())));

        let map_uri = "pulse-crawl://map/example.com/1712000000/page-2";
        assert_eq!(
            uri_to_location(map_uri),
            Some((Tier::Map, "example.com-1712000000-page-2".to_string()))
        );

        assert_eq!(uri_to_location("pulse-fetch://scraped/bogus/x"), None);
        assert_eq!(uri_to_location("other://x"), None);
    }

    #[test]
    fn build_entries_cross_links_siblings() {
        let req = WriteRequest {
            url: normalize_url("https://test.com/page").unwrap(),
            extract_query: None,
            actions: Vec::new(),
            raw: Some(TierWrite {
                payload: "<h1>Hi</h1>".to_string(),
                mime_type: "text/html".to_string(),
            }),
            cleaned: Some("# Hi".to_string()),
            extracted: None,
        };
        let (fp, entries) = build_entries(&req, Utc::now());
        assert_eq!(entries.len(), 2);
        let raw = entries.iter().find(|e| e.tier == Tier::Raw).unwrap();
        let cleaned = entries.iter().find(|e| e.tier == Tier::Cleaned).unwrap();
        assert_eq!(raw.links.as_ref().unwrap().cleaned.as_deref(), Some(cleaned.uri.as_str()));
        assert_eq!(cleaned.links.as_ref().unwrap().raw.as_deref(), Some(raw.uri.as_str()));
        assert!(raw.links.as_ref().unwrap().raw.is_none());
        assert!(raw.uri.ends_with(&fp));
    }
}
