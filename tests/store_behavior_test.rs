//! Storage-tier properties: partial-failure reporting, atomicity of
//! re-writes, and identity stability across backends.

use pulse_crawl::store::{
    fingerprint, normalize_url, FilesystemStore, MemoryStore, ResourceStore, Tier, TierWrite,
    WriteRequest,
};
use pulse_crawl::PulseError;

fn full_request(url: &str) -> WriteRequest {
    WriteRequest {
        url: normalize_url(url).unwrap(),
        extract_query: Some("title".to_string()),
        actions: Vec::new(),
        raw: Some(TierWrite {
            payload: "<h1>T</h1>".to_string(),
            mime_type: "text/html".to_string(),
        }),
        cleaned: Some("# T".to_string()),
        extracted: Some("T".to_string()),
    }
}

// One tier failing reports per-tier and still returns the URIs that
// succeeded.
#[tokio::test]
async fn partial_tier_failure_returns_surviving_uris() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path()).unwrap();

    // Make the extracted tier unwritable by turning its directory into a
    // plain file.
    std::fs::remove_dir_all(dir.path().join("extracted")).unwrap();
    std::fs::write(dir.path().join("extracted"), b"not a directory").unwrap();

    let outcome = store.write_multi(full_request("https://test.com/p")).await.unwrap();
    assert!(outcome.raw_uri.is_some());
    assert!(outcome.cleaned_uri.is_some());
    assert!(outcome.extracted_uri.is_none());
    assert_eq!(outcome.tier_errors.len(), 1);
    assert!(outcome.tier_errors[0].starts_with("extracted:"), "{:?}", outcome.tier_errors);

    // Surviving tiers read back fine.
    let entry = store.read(outcome.cleaned_uri.as_deref().unwrap()).await.unwrap();
    assert_eq!(entry.unwrap().payload, "# T");
}

// The write as a whole errors only when every tier failed.
#[tokio::test]
async fn total_tier_failure_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path()).unwrap();
    for tier in ["raw", "cleaned", "extracted"] {
        std::fs::remove_dir_all(dir.path().join(tier)).unwrap();
        std::fs::write(dir.path().join(tier), b"blocked").unwrap();
    }

    let err = store.write_multi(full_request("https://test.com/p")).await.unwrap_err();
    assert!(matches!(err, PulseError::Storage(_)));
}

// A later failed write never clobbers the prior good entry: the rename
// step only happens after a complete temp file exists.
#[tokio::test]
async fn failed_rewrite_leaves_previous_entry_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path()).unwrap();

    let mut first = full_request("https://test.com/p");
    first.extracted = None;
    let outcome = store.write_multi(first).await.unwrap();
    let cleaned_uri = outcome.cleaned_uri.unwrap();

    // Second write adds the extracted tier, which now cannot be written.
    std::fs::remove_dir_all(dir.path().join("extracted")).unwrap();
    std::fs::write(dir.path().join("extracted"), b"blocked").unwrap();
    let mut second = full_request("https://test.com/p");
    second.cleaned = Some("# T v2".to_string());
    let outcome = store.write_multi(second).await.unwrap();
    assert!(outcome.extracted_uri.is_none());

    let entry = store.read(&cleaned_uri).await.unwrap().unwrap();
    assert_eq!(entry.payload, "# T v2", "good tiers replace atomically");
}

// Identity is stable across backends and processes: both stores agree on
// the fingerprint for the same inputs.
#[tokio::test]
async fn backends_share_fingerprints_and_uris() {
    let normalized = normalize_url("https://Test.com/p?b=2&a=1").unwrap();
    let fp = fingerprint(&normalized, Some("title"), &[]);

    let memory = MemoryStore::new();
    let dir = tempfile::tempdir().unwrap();
    let fs = FilesystemStore::new(dir.path()).unwrap();

    let mem_outcome = memory.write_multi(full_request("https://Test.com/p?b=2&a=1")).await.unwrap();
    let fs_outcome = fs.write_multi(full_request("https://test.com/p?a=1&b=2")).await.unwrap();

    assert_eq!(mem_outcome.raw_uri, fs_outcome.raw_uri);
    assert!(mem_outcome.raw_uri.as_deref().unwrap().ends_with(&fp));
}

// Cross-tier links let a reader of any tier find its siblings.
#[tokio::test]
async fn sibling_links_resolve_through_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path()).unwrap();
    let outcome = store.write_multi(full_request("https://test.com/linked")).await.unwrap();

    let raw = store.read(outcome.raw_uri.as_deref().unwrap()).await.unwrap().unwrap();
    let links = raw.links.expect("raw links to siblings");
    assert_eq!(links.cleaned.as_deref(), outcome.cleaned_uri.as_deref());
    assert_eq!(links.extracted.as_deref(), outcome.extracted_uri.as_deref());

    let extracted = store.read(links.extracted.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(extracted.tier, Tier::Extracted);
    assert_eq!(extracted.payload, "T");
}
