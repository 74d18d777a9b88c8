use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::core::errors::{FetchDiagnostics, FetchFailure};
use crate::core::types::{OptimizeFor, Strategy};

use super::{FetchClient, FetchOptions, FetchResult, StrategyTable};

/// A successful selection: the winning result plus the per-attempt record
/// of everything tried on the way there.
#[derive(Debug)]
pub struct SelectedFetch {
    pub result: FetchResult,
    pub diagnostics: FetchDiagnostics,
}

/// Chooses, runs, and learns a fetch strategy per URL.
///
/// Cost mode tries the learned winner for the URL's pattern first (native
/// otherwise), falling through the remaining strategies in {native, vendor}
/// order. Speed mode goes straight to the vendor. An auth rejection from
/// the vendor aborts fallback immediately.
pub struct StrategySelector {
    native: Option<Arc<dyn FetchClient>>,
    vendor: Option<Arc<dyn FetchClient>>,
    table: Arc<StrategyTable>,
    mode: OptimizeFor,
}

impl StrategySelector {
    pub fn new(
        native: Option<Arc<dyn FetchClient>>,
        vendor: Option<Arc<dyn FetchClient>>,
        table: Arc<StrategyTable>,
        mode: OptimizeFor,
    ) -> Self {
        Self { native, vendor, table, mode }
    }

    pub fn table(&self) -> &Arc<StrategyTable> {
        &self.table
    }

    fn client_for(&self, strategy: Strategy) -> Option<&Arc<dyn FetchClient>> {
        match strategy {
            Strategy::Native => self.native.as_ref(),
            Strategy::Vendor => self.vendor.as_ref(),
        }
    }

    /// The strategy tried first when nothing has been learned; a win by
    /// any other strategy is worth remembering.
    fn default_strategy(&self, options: &FetchOptions) -> Strategy {
        if self.mode == OptimizeFor::Speed || !options.actions.is_empty() {
            Strategy::Vendor
        } else {
            Strategy::Native
        }
    }

    async fn attempt_order(&self, url: &str, options: &FetchOptions) -> Vec<Strategy> {
        // Browser actions need a JS runtime; only the vendor has one.
        if self.mode == OptimizeFor::Speed || !options.actions.is_empty() {
            return vec![Strategy::Vendor];
        }

        let mut order = Vec::with_capacity(2);
        if let Some(learned) = self.table.lookup(url).await {
            info!("learned strategy {} applies to {}", learned, url);
            order.push(learned);
        }
        for strategy in [Strategy::Native, Strategy::Vendor] {
            if !order.contains(&strategy) {
                order.push(strategy);
            }
        }
        order
    }

    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<SelectedFetch, FetchFailure> {
        let order = self.attempt_order(url, options).await;
        let default = self.default_strategy(options);
        let mut diagnostics = FetchDiagnostics::default();

        for strategy in order {
            let Some(client) = self.client_for(strategy) else {
                diagnostics.record_error(strategy, format!("{} client not configured", label(strategy)));
                continue;
            };

            let started = Instant::now();
            let result = client.fetch(url, options).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            diagnostics.record_attempt(strategy, elapsed_ms);

            if result.success {
                info!("{} fetch succeeded for {} in {}ms", strategy, url, elapsed_ms);
                if strategy != default {
                    self.table.record(url, strategy).await;
                }
                return Ok(SelectedFetch { result, diagnostics });
            }

            let reason = result.failure_reason();
            warn!("{} fetch failed for {}: {}", strategy, url, reason);
            diagnostics.record_error(strategy, reason);

            if result.is_auth_error {
                return Err(FetchFailure { diagnostics, is_auth_error: true });
            }
        }

        Err(FetchFailure { diagnostics, is_auth_error: false })
    }
}

fn label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Native => "Native",
        Strategy::Vendor => "Vendor",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct StubClient {
        strategy: Strategy,
        result: FetchResult,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FetchClient for StubClient {
        fn strategy(&self) -> Strategy {
            self.strategy
        }

        async fn fetch(&self, _url: &str, _options: &FetchOptions) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn stub(strategy: Strategy, result: FetchResult) -> (Arc<dyn FetchClient>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(StubClient { strategy, result, calls: calls.clone() });
        (client, calls)
    }

    fn selector(
        native: Option<Arc<dyn FetchClient>>,
        vendor: Option<Arc<dyn FetchClient>>,
        mode: OptimizeFor,
    ) -> StrategySelector {
        StrategySelector::new(native, vendor, Arc::new(StrategyTable::in_memory()), mode)
    }

    #[tokio::test]
    async fn native_failure_falls_back_to_vendor_with_diagnostics() {
        let (native, _) = stub(
            Strategy::Native,
            FetchResult::failed(Strategy::Native, Some(403), "HTTP 403"),
        );
        let (vendor, _) = stub(Strategy::Vendor, FetchResult::ok(Strategy::Vendor, "Content".into(), Some(200)));

        let selected = selector(Some(native), Some(vendor), OptimizeFor::Cost)
            .fetch("https://example.com/p", &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(selected.result.source, Strategy::Vendor);
        assert_eq!(
            selected.diagnostics.strategies_attempted,
            vec![Strategy::Native, Strategy::Vendor]
        );
        assert_eq!(
            selected.diagnostics.strategy_errors.get("native").map(String::as_str),
            Some("HTTP 403")
        );
        assert!(selected.diagnostics.strategy_errors.get("vendor").is_none());
        assert!(selected.diagnostics.timing_ms.contains_key("native"));
        assert!(selected.diagnostics.timing_ms.contains_key("vendor"));
    }

    #[tokio::test]
    async fn all_failures_compose_into_one_message() {
        let (native, _) = stub(
            Strategy::Native,
            FetchResult::failed(Strategy::Native, Some(403), "HTTP 403"),
        );
        let (vendor, _) = stub(
            Strategy::Vendor,
            FetchResult::failed(Strategy::Vendor, Some(429), "Rate limited"),
        );

        let failure = selector(Some(native), Some(vendor), OptimizeFor::Cost)
            .fetch("https://example.com/p", &FetchOptions::default())
            .await
            .unwrap_err();

        assert!(!failure.is_auth_error);
        let msg = failure.to_string();
        assert!(msg.contains("All strategies failed"), "{}", msg);
        assert!(msg.contains("Attempted: native, vendor"), "{}", msg);
        assert!(msg.contains("native: HTTP 403"), "{}", msg);
        assert!(msg.contains("vendor: Rate limited"), "{}", msg);
        assert_eq!(failure.diagnostics.timing_ms.len(), 2);
    }

    #[tokio::test]
    async fn vendor_auth_error_stops_fallback() {
        let (native, _) = stub(
            Strategy::Native,
            FetchResult::failed(Strategy::Native, None, "connection refused"),
        );
        let (vendor, _) = stub(
            Strategy::Vendor,
            FetchResult::auth_failed(Strategy::Vendor, Some(401), "Unauthorized: Invalid API key"),
        );

        let failure = selector(Some(native), Some(vendor), OptimizeFor::Cost)
            .fetch("https://example.com/p", &FetchOptions::default())
            .await
            .unwrap_err();

        assert!(failure.is_auth_error);
        assert_eq!(
            failure.diagnostics.strategies_attempted.last().copied(),
            Some(Strategy::Vendor)
        );
        assert!(failure.to_string().contains("Vendor authentication error"));
    }

    #[tokio::test]
    async fn speed_mode_never_touches_native() {
        let (native, native_calls) = stub(
            Strategy::Native,
            FetchResult::ok(Strategy::Native, "native".into(), Some(200)),
        );
        let (vendor, _) = stub(Strategy::Vendor, FetchResult::ok(Strategy::Vendor, "vendor".into(), Some(200)));

        let selected = selector(Some(native), Some(vendor), OptimizeFor::Speed)
            .fetch("https://example.com/p", &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(selected.result.source, Strategy::Vendor);
        assert_eq!(native_calls.load(Ordering::SeqCst), 0);
        assert_eq!(selected.diagnostics.strategies_attempted, vec![Strategy::Vendor]);
        assert!(selected.diagnostics.strategy_errors.get("native").is_none());
    }

    #[tokio::test]
    async fn missing_vendor_is_reported_not_attempted() {
        let (native, _) = stub(
            Strategy::Native,
            FetchResult::failed(Strategy::Native, Some(500), "HTTP 500"),
        );

        let failure = selector(Some(native), None, OptimizeFor::Cost)
            .fetch("https://example.com/p", &FetchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(failure.diagnostics.strategies_attempted, vec![Strategy::Native]);
        assert_eq!(
            failure.diagnostics.strategy_errors.get("vendor").map(String::as_str),
            Some("Vendor client not configured")
        );
    }

    #[tokio::test]
    async fn vendor_win_is_learned_and_reused() {
        let (native, _) = stub(
            Strategy::Native,
            FetchResult::failed(Strategy::Native, Some(403), "HTTP 403"),
        );
        let (vendor, vendor_calls) = stub(
            Strategy::Vendor,
            FetchResult::ok(Strategy::Vendor, "vendor".into(), Some(200)),
        );
        let selector = selector(Some(native), Some(vendor), OptimizeFor::Cost);

        selector
            .fetch("https://example.com/posts/1", &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(selector.table().len().await, 1);

        // Same pattern, different id: learned vendor goes first now.
        let selected = selector
            .fetch("https://example.com/posts/2", &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(selected.diagnostics.strategies_attempted, vec![Strategy::Vendor]);
        assert_eq!(vendor_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn browser_actions_force_the_vendor() {
        let (native, native_calls) = stub(
            Strategy::Native,
            FetchResult::ok(Strategy::Native, "native".into(), Some(200)),
        );
        let (vendor, _) = stub(Strategy::Vendor, FetchResult::ok(Strategy::Vendor, "vendor".into(), Some(200)));

        let mut options = FetchOptions::default();
        options.actions = vec![serde_json::from_value(
            serde_json::json!({"type": "click", "selector": "#btn"}),
        )
        .unwrap()];

        let selected = selector(Some(native), Some(vendor), OptimizeFor::Cost)
            .fetch("https://example.com/p", &options)
            .await
            .unwrap();
        assert_eq!(selected.result.source, Strategy::Vendor);
        assert_eq!(native_calls.load(Ordering::SeqCst), 0);
    }
}
