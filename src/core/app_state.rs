use std::sync::Arc;

use anyhow::Context;

use crate::core::config::{Config, StorageBackend};
use crate::extract::{build_extractor, Extractor};
use crate::fetch::{FetchClient, NativeClient, StrategySelector, StrategyTable, VendorClient};
use crate::store::{FilesystemStore, MemoryStore, ResourceStore};
use crate::tools::crawl::CrawlProxy;

/// Shared application state, built once at startup and passed explicitly
/// to every handler. The `with_*` builders exist for tests that swap in
/// mock collaborators.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
    pub store: Arc<dyn ResourceStore>,
    pub selector: Arc<StrategySelector>,
    pub vendor: Option<Arc<VendorClient>>,
    pub extractor: Option<Arc<dyn Extractor>>,
    pub crawler: Arc<CrawlProxy>,
    // Concurrency control for outbound upstream calls.
    pub outbound_limit: Arc<tokio::sync::Semaphore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.config.storage)
            .field("vendor_enabled", &self.vendor.is_some())
            .field("extractor_enabled", &self.extractor.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let store: Arc<dyn ResourceStore> = match config.storage {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Filesystem => {
                let root = config
                    .filesystem_root
                    .as_ref()
                    .context("filesystem storage selected but no root configured")?;
                Arc::new(
                    FilesystemStore::new(root)
                        .with_context(|| format!("storage root {} is not usable", root.display()))?,
                )
            }
        };

        let table = match (&config.storage, &config.filesystem_root) {
            (StorageBackend::Filesystem, Some(root)) => {
                Arc::new(StrategyTable::load(root.join("strategies").join("learned.json")))
            }
            _ => Arc::new(StrategyTable::in_memory()),
        };

        let native: Arc<dyn FetchClient> = Arc::new(NativeClient::new(http_client.clone()));
        let vendor = config.vendor_api_key.as_ref().map(|key| {
            Arc::new(VendorClient::new(http_client.clone(), key.clone(), config.vendor_base_url.clone()))
        });
        let selector = Arc::new(StrategySelector::new(
            Some(native),
            vendor.clone().map(|v| v as Arc<dyn FetchClient>),
            table,
            config.optimize_for,
        ));

        let extractor = config.llm.as_ref().map(|llm| build_extractor(llm, http_client.clone()));
        let crawler = Arc::new(CrawlProxy::new(vendor.clone()));

        let outbound_limit = Arc::new(tokio::sync::Semaphore::new(config.outbound_limit.max(1)));

        Ok(Self {
            http_client,
            config: Arc::new(config),
            store,
            selector,
            vendor,
            extractor,
            crawler,
            outbound_limit,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_selector(mut self, selector: Arc<StrategySelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }
}
