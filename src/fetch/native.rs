use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use tracing::debug;

use crate::core::types::Strategy;

use super::{FetchClient, FetchOptions, FetchResult};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PulseCrawl/1.2)";

/// Direct HTTP strategy. No JavaScript, no anti-bot evasion; reports the
/// HTTP status faithfully and leaves fallback decisions to the selector.
pub struct NativeClient {
    client: reqwest::Client,
}

impl NativeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn attempt(&self, url: &str, options: &FetchOptions) -> Result<FetchResult, reqwest::Error> {
        let mut request = self
            .client
            .get(url)
            .timeout(Duration::from_millis(options.timeout_ms))
            .header("User-Agent", USER_AGENT);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        // Charset-aware decode with UTF-8 fallback.
        let body = response.text().await?;

        if (200..300).contains(&status) {
            Ok(FetchResult::ok(Strategy::Native, body, Some(status)))
        } else {
            Ok(FetchResult::failed(Strategy::Native, Some(status), format!("HTTP {}", status)))
        }
    }
}

#[async_trait]
impl FetchClient for NativeClient {
    fn strategy(&self) -> Strategy {
        Strategy::Native
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        if options.wait_for_ms.is_some() {
            debug!("waitFor is a no-op for the native fetcher (no JS runtime)");
        }

        // Retry transient transport errors only; HTTP status outcomes are
        // returned as-is on the first attempt. The retry budget stays well
        // under the request timeout.
        let max_elapsed = Duration::from_millis(options.timeout_ms.min(6_000));
        let result = retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(200))
                .with_max_interval(Duration::from_secs(2))
                .with_max_elapsed_time(Some(max_elapsed))
                .build(),
            || async {
                match self.attempt(url, options).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) if e.is_timeout() => Err(backoff::Error::permanent(e)),
                    Err(e) => Err(backoff::Error::transient(e)),
                }
            },
        )
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_timeout() => FetchResult::failed(
                Strategy::Native,
                None,
                format!("request timed out after {}ms", options.timeout_ms),
            ),
            Err(e) => FetchResult::failed(Strategy::Native, None, e.to_string()),
        }
    }
}
