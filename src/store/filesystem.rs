use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::core::errors::PulseError;
use crate::core::types::BrowserAction;

use super::{
    build_entries, fingerprint, normalize_url, sort_entries, uri_to_location, ListPage,
    ResourceEntry, ResourceStore, Tier, WriteOutcome, WriteRequest,
};

const ALL_DIRS: [&str; 5] = ["raw", "cleaned", "extracted", "map", "strategies"];

/// Filesystem backend: one JSON file per entry under
/// `<root>/<tier>/<fingerprint>.json`. Writes go through a temp-file +
/// rename so a crash never leaves a half-written entry visible, and writers
/// to the same fingerprint are serialized through a per-key lock.
pub struct FilesystemStore {
    root: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FilesystemStore {
    /// Create the tier directories up front; an unwritable root is a
    /// startup error.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        for dir in ALL_DIRS {
            std::fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root, write_locks: Mutex::new(HashMap::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn strategies_path(&self) -> PathBuf {
        self.root.join("strategies").join("learned.json")
    }

    fn entry_path(&self, tier: Tier, key: &str) -> PathBuf {
        self.root.join(tier.as_str()).join(format!("{}.json", key))
    }

    async fn lock_key(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn persist(&self, entry: &ResourceEntry) -> Result<(), String> {
        let path = self.entry_path(entry.tier, &entry.fingerprint);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entry).map_err(|e| e.to_string())?;
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| e.to_string())?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| e.to_string())
    }

    async fn load(&self, path: &Path) -> Option<ResourceEntry> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable resource entry {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl ResourceStore for FilesystemStore {
    async fn write_multi(&self, req: WriteRequest) -> Result<WriteOutcome, PulseError> {
        if req.is_empty() {
            return Err(PulseError::Storage("no tiers supplied".to_string()));
        }
        let (fp, entries) = build_entries(&req, Utc::now());

        let key_lock = self.lock_key(&fp).await;
        let _guard = key_lock.lock().await;

        let mut outcome = WriteOutcome::default();
        let mut attempted = 0usize;
        for entry in &entries {
            attempted += 1;
            match self.persist(entry).await {
                Ok(()) => match entry.tier {
                    Tier::Raw => outcome.raw_uri = Some(entry.uri.clone()),
                    Tier::Cleaned => outcome.cleaned_uri = Some(entry.uri.clone()),
                    Tier::Extracted => outcome.extracted_uri = Some(entry.uri.clone()),
                    Tier::Map => {}
                },
                Err(e) => {
                    warn!("tier {} write failed for {}: {}", entry.tier, fp, e);
                    outcome.tier_errors.push(format!("{}: {}", entry.tier, e));
                }
            }
        }

        if outcome.tier_errors.len() == attempted {
            return Err(PulseError::Storage(outcome.tier_errors.join("; ")));
        }
        Ok(outcome)
    }

    async fn write_entry(&self, entry: ResourceEntry) -> Result<String, PulseError> {
        let key_lock = self.lock_key(&entry.fingerprint).await;
        let _guard = key_lock.lock().await;
        self.persist(&entry).await.map_err(PulseError::Storage)?;
        Ok(entry.uri)
    }

    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
        actions: &[BrowserAction],
    ) -> Result<Vec<ResourceEntry>, PulseError> {
        let normalized = normalize_url(url)?;
        let fp = fingerprint(&normalized, extract_query, actions);

        let reads = Tier::SCRAPED.map(|tier| self.entry_path(tier, &fp));
        let mut entries: Vec<ResourceEntry> =
            futures::future::join_all(reads.iter().map(|path| self.load(path)))
                .await
                .into_iter()
                .flatten()
                .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn read(&self, uri: &str) -> Result<Option<ResourceEntry>, PulseError> {
        let Some((tier, key)) = uri_to_location(uri) else {
            return Ok(None);
        };
        Ok(self.load(&self.entry_path(tier, &key)).await)
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, PulseError> {
        let limit = limit.max(1);

        let mut all: Vec<ResourceEntry> = Vec::new();
        for dir in [Tier::Raw, Tier::Cleaned, Tier::Extracted, Tier::Map] {
            let dir_path = self.root.join(dir.as_str());
            let mut rd = match tokio::fs::read_dir(&dir_path).await {
                Ok(rd) => rd,
                Err(_) => continue,
            };
            while let Ok(Some(item)) = rd.next_entry().await {
                let path = item.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(entry) = self.load(&path).await {
                    entries_push_filtered(&mut all, entry, prefix, cursor);
                }
            }
        }

        all.sort_by(|a, b| a.uri.cmp(&b.uri));
        let next_cursor = if all.len() > limit {
            all.truncate(limit);
            all.last().map(|e| e.uri.clone())
        } else {
            None
        };
        Ok(ListPage { entries: all, next_cursor })
    }
}

fn entries_push_filtered(
    out: &mut Vec<ResourceEntry>,
    entry: ResourceEntry,
    prefix: Option<&str>,
    cursor: Option<&str>,
) {
    if let Some(p) = prefix {
        if !entry.uri.starts_with(p) {
            return;
        }
    }
    if let Some(c) = cursor {
        if entry.uri.as_str() <= c {
            return;
        }
    }
    out.push(entry);
}
