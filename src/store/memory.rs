use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::core::errors::PulseError;
use crate::core::types::BrowserAction;

use super::{
    build_entries, fingerprint, normalize_url, sort_entries, ListPage, ResourceEntry,
    ResourceStore, WriteOutcome, WriteRequest,
};

/// Process-local backend: a URI-ordered map plus a fingerprint index under
/// one lock. Lost on restart; the single write lock trivially serializes
/// same-fingerprint writers.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_uri: BTreeMap<String, ResourceEntry>,
    by_fingerprint: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only seam: drop everything.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.by_uri.clear();
        inner.by_fingerprint.clear();
    }
}

impl Inner {
    fn insert(&mut self, entry: ResourceEntry) {
        let uris = self.by_fingerprint.entry(entry.fingerprint.clone()).or_default();
        if !uris.contains(&entry.uri) {
            uris.push(entry.uri.clone());
        }
        self.by_uri.insert(entry.uri.clone(), entry);
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn write_multi(&self, req: WriteRequest) -> Result<WriteOutcome, PulseError> {
        if req.is_empty() {
            return Err(PulseError::Storage("no tiers supplied".to_string()));
        }
        let (_, entries) = build_entries(&req, Utc::now());

        let mut outcome = WriteOutcome::default();
        let mut inner = self.inner.write().await;
        for entry in entries {
            match entry.tier {
                super::Tier::Raw => outcome.raw_uri = Some(entry.uri.clone()),
                super::Tier::Cleaned => outcome.cleaned_uri = Some(entry.uri.clone()),
                super::Tier::Extracted => outcome.extracted_uri = Some(entry.uri.clone()),
                super::Tier::Map => {}
            }
            inner.insert(entry);
        }
        Ok(outcome)
    }

    async fn write_entry(&self, entry: ResourceEntry) -> Result<String, PulseError> {
        let uri = entry.uri.clone();
        self.inner.write().await.insert(entry);
        Ok(uri)
    }

    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
        actions: &[BrowserAction],
    ) -> Result<Vec<ResourceEntry>, PulseError> {
        let normalized = normalize_url(url)?;
        let fp = fingerprint(&normalized, extract_query, actions);

        let inner = self.inner.read().await;
        let mut entries: Vec<ResourceEntry> = inner
            .by_fingerprint
            .get(&fp)
            .map(|uris| uris.iter().filter_map(|u| inner.by_uri.get(u).cloned()).collect())
            .unwrap_or_default();
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn read(&self, uri: &str) -> Result<Option<ResourceEntry>, PulseError> {
        Ok(self.inner.read().await.by_uri.get(uri).cloned())
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, PulseError> {
        let limit = limit.max(1);
        let inner = self.inner.read().await;

        let mut entries: Vec<ResourceEntry> = Vec::with_capacity(limit);
        let mut next_cursor = None;
        for (uri, entry) in inner.by_uri.iter() {
            if let Some(cur) = cursor {
                if uri.as_str() <= cur {
                    continue;
                }
            }
            if let Some(p) = prefix {
                if !uri.starts_with(p) {
                    continue;
                }
            }
            if entries.len() == limit {
                next_cursor = entries.last().map(|e: &ResourceEntry| e.uri.clone());
                break;
            }
            entries.push(entry.clone());
        }
        Ok(ListPage { entries, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Tier, TierWrite};
    use super::*;

    fn write_req(url: &str, extract: Option<&str>) -> WriteRequest {
        WriteRequest {
            url: normalize_url(url).unwrap(),
            extract_query: extract.map(|s| s.to_string()),
            actions: Vec::new(),
            raw: Some(TierWrite {
                payload: "<h1>Hello</h1>".to_string(),
                mime_type: "text/html".to_string(),
            }),
            cleaned: Some("# Hello".to_string()),
            extracted: extract.map(|_| "Hello".to_string()),
        }
    }

    #[tokio::test]
    async fn written_tiers_are_found_by_identity() {
        let store = MemoryStore::new();
        let outcome = store.write_multi(write_req("https://a.example/p", Some("title"))).await.unwrap();
        assert!(outcome.raw_uri.is_some());
        assert!(outcome.extracted_uri.is_some());

        let found = store
            .find_by_url_and_extract("https://a.example/p", Some("title"), &[])
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        // Most refined tier first.
        assert_eq!(found[0].tier, Tier::Extracted);

        // A different extract query is a different identity.
        let miss = store
            .find_by_url_and_extract("https://a.example/p", Some("author"), &[])
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn rewrite_replaces_the_live_entry() {
        let store = MemoryStore::new();
        store.write_multi(write_req("https://a.example/p", None)).await.unwrap();
        let mut second = write_req("https://a.example/p", None);
        second.cleaned = Some("# Updated".to_string());
        store.write_multi(second).await.unwrap();

        let found = store
            .find_by_url_and_extract("https://a.example/p", None, &[])
            .await
            .unwrap();
        let cleaned: Vec<_> = found.iter().filter(|e| e.tier == Tier::Cleaned).collect();
        assert_eq!(cleaned.len(), 1, "one live entry per tier per fingerprint");
        assert_eq!(cleaned[0].payload, "# Updated");
    }

    #[tokio::test]
    async fn list_pages_through_uris_with_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .write_multi(write_req(&format!("https://a.example/p{}", i), None))
                .await
                .unwrap();
        }

        let first = store.list(None, None, 4).await.unwrap();
        assert_eq!(first.entries.len(), 4);
        let cursor = first.next_cursor.expect("more pages");

        let rest = store.list(None, Some(&cursor), 100).await.unwrap();
        assert_eq!(first.entries.len() + rest.entries.len(), 10); // 5 urls × 2 tiers
        assert!(rest.next_cursor.is_none());

        let cleaned_only = store
            .list(Some("pulse-fetch://scraped/cleaned/"), None, 100)
            .await
            .unwrap();
        assert_eq!(cleaned_only.entries.len(), 5);
    }

    #[tokio::test]
    async fn read_returns_none_for_unknown_uri() {
        let store = MemoryStore::new();
        assert!(store
            .read("pulse-fetch://scraped/raw/missing-0000000000000000")
            .await
            .unwrap()
            .is_none());
    }
}
