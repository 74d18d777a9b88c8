use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use url::Url;

use crate::core::types::Strategy;

/// Learned entries older than this are ignored on lookup (kept on disk;
/// refreshed by the next success).
const STALE_AFTER_DAYS: i64 = 7;

/// A URL pattern → winning-strategy record. Patterns wildcard volatile
/// path segments (ids, hashes) so one success covers the whole family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedStrategy {
    pub pattern: String,
    pub strategy: Strategy,
    pub updated_at: DateTime<Utc>,
}

/// Persisted per-site strategy table. Reads see a consistent snapshot;
/// updates are single-writer and swap the whole file atomically.
pub struct StrategyTable {
    path: Option<PathBuf>,
    entries: RwLock<Vec<LearnedStrategy>>,
    persist_lock: Mutex<()>,
}

impl StrategyTable {
    pub fn in_memory() -> Self {
        Self { path: None, entries: RwLock::new(Vec::new()), persist_lock: Mutex::new(()) }
    }

    /// Load `strategies/learned.json`. A missing or unreadable file starts
    /// an empty table; learning is an optimization, never a hard error.
    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<LearnedStrategy>>(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("learned-strategy file {} is invalid: {} — starting empty", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path: Some(path), entries: RwLock::new(entries), persist_lock: Mutex::new(()) }
    }

    /// Longest-matching fresh pattern for this URL, if any. Patterns are
    /// matched against the URL's raw path segments: `*` covers anything,
    /// literals must match exactly.
    pub async fn lookup(&self, url: &str) -> Option<Strategy> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let segments: Vec<String> = parsed
            .path_segments()
            .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let target = (host, segments);
        let cutoff = Utc::now() - Duration::days(STALE_AFTER_DAYS);

        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.updated_at >= cutoff)
            .filter_map(|e| {
                let candidate = split_pattern(&e.pattern)?;
                match_score(&candidate, &target).map(|score| (score, e.strategy))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, strategy)| strategy)
    }

    /// Upsert the pattern for this URL and persist. Called only after a
    /// successful fetch.
    pub async fn record(&self, url: &str, strategy: Strategy) {
        let Some(pattern) = derive_pattern(url) else {
            return;
        };

        let snapshot = {
            let mut entries = self.entries.write().await;
            match entries.iter_mut().find(|e| e.pattern == pattern) {
                Some(entry) => {
                    entry.strategy = strategy;
                    entry.updated_at = Utc::now();
                }
                None => entries.push(LearnedStrategy {
                    pattern: pattern.clone(),
                    strategy,
                    updated_at: Utc::now(),
                }),
            }
            entries.clone()
        };
        debug!("learned strategy {} for pattern {}", strategy, pattern);

        if let Some(path) = &self.path {
            let _guard = self.persist_lock.lock().await;
            if let Err(e) = persist(path, &snapshot).await {
                warn!("failed to persist learned strategies to {}: {}", path.display(), e);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

async fn persist(path: &PathBuf, entries: &[LearnedStrategy]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(entries).unwrap_or_default();
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// `host/seg/seg/…` with volatile segments replaced by `*`. Query and
/// fragment never participate.
pub fn derive_pattern(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let segments: Vec<String> = parsed
        .path_segments()
        .map(|segs| {
            segs.filter(|s| !s.is_empty())
                .map(|s| if is_volatile_segment(s) { "*".to_string() } else { s.to_string() })
                .collect()
        })
        .unwrap_or_default();

    if segments.is_empty() {
        Some(host)
    } else {
        Some(format!("{}/{}", host, segments.join("/")))
    }
}

/// Classify a path segment as volatile: purely numeric ids, hex hashes,
/// UUIDs, and long mixed alphanumeric tokens.
fn is_volatile_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if segment.len() >= 8 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    if is_uuid_shaped(segment) {
        return true;
    }
    segment.len() >= 16
        && segment.chars().all(|c| c.is_ascii_alphanumeric())
        && segment.chars().any(|c| c.is_ascii_digit())
}

fn is_uuid_shaped(segment: &str) -> bool {
    let parts: Vec<&str> = segment.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(&parts)
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

fn split_pattern(pattern: &str) -> Option<(String, Vec<String>)> {
    match pattern.split_once('/') {
        Some((host, rest)) => Some((
            host.to_string(),
            rest.split('/').map(|s| s.to_string()).collect(),
        )),
        None => Some((pattern.to_string(), Vec::new())),
    }
}

/// Returns the number of literal segment matches when `candidate` covers
/// the URL's `(host, raw segments)` — same host, same depth, `*` covers
/// any segment. Higher score = more literal = longer match.
fn match_score(candidate: &(String, Vec<String>), target: &(String, Vec<String>)) -> Option<usize> {
    if candidate.0 != target.0 || candidate.1.len() != target.1.len() {
        return None;
    }
    let mut score = 1; // host match
    for (c, t) in candidate.1.iter().zip(&target.1) {
        if c == "*" {
            continue;
        }
        if c == t {
            score += 1;
        } else {
            return None;
        }
    }
    Some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_hash_segments_become_wildcards() {
        assert_eq!(
            derive_pattern("https://example.com/posts/12345/comments").as_deref(),
            Some("example.com/posts/*/comments")
        );
        assert_eq!(
            derive_pattern("https://example.com/build/deadbeef01").as_deref(),
            Some("example.com/build/*")
        );
        assert_eq!(
            derive_pattern("https://example.com/item/550e8400-e29b-41d4-a716-446655440000").as_deref(),
            Some("example.com/item/*")
        );
    }

    #[test]
    fn literal_segments_survive() {
        assert_eq!(
            derive_pattern("https://docs.example.com/guide/install").as_deref(),
            Some("docs.example.com/guide/install")
        );
        assert_eq!(derive_pattern("https://example.com/").as_deref(), Some("example.com"));
    }

    #[test]
    fn pattern_is_stable_across_id_formats() {
        let a = derive_pattern("https://example.com/posts/42").unwrap();
        let b = derive_pattern("https://example.com/posts/987654321").unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn lookup_prefers_the_most_literal_pattern() {
        let table = StrategyTable::in_memory();
        table.record("https://example.com/posts/1", Strategy::Native).await;
        table.record("https://example.com/posts/special", Strategy::Vendor).await;

        // /posts/special matches its own literal pattern, not the wildcard.
        assert_eq!(
            table.lookup("https://example.com/posts/special").await,
            Some(Strategy::Vendor)
        );
        assert_eq!(
            table.lookup("https://example.com/posts/999").await,
            Some(Strategy::Native)
        );
        assert_eq!(table.lookup("https://other.com/posts/1").await, None);
    }

    #[tokio::test]
    async fn stale_entries_are_ignored() {
        let table = StrategyTable::in_memory();
        table.record("https://example.com/a", Strategy::Vendor).await;
        {
            let mut entries = table.entries.write().await;
            entries[0].updated_at = Utc::now() - Duration::days(STALE_AFTER_DAYS + 1);
        }
        assert_eq!(table.lookup("https://example.com/a").await, None);
    }

    #[tokio::test]
    async fn table_round_trips_through_the_learned_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learned.json");

        let table = StrategyTable::load(path.clone());
        table.record("https://example.com/app/123", Strategy::Vendor).await;

        let reloaded = StrategyTable::load(path.clone());
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(
            reloaded.lookup("https://example.com/app/55").await,
            Some(Strategy::Vendor)
        );

        // Whole-file swap leaves no temp debris.
        assert!(!path.with_extension("json.tmp").exists());
    }
}
