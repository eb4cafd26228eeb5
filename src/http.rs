//! HTTP fetching of route geometries and the reference-post table.
//!
//! - Connection pooling through a single `reqwest` client
//! - Route geometries fetched concurrently (bounded)
//! - Geometry and reference table fetched at the same time
//! - Retry with exponential backoff on connection errors, 429 and 5xx
//!
//! Failures never abort the load: a route that cannot be fetched is left out
//! and a table that cannot be fetched is installed empty.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};

use crate::config::{RouteSource, SourceConfig};
use crate::error::{LoadError, Result};
use crate::geometry::{Route, RouteStore};
use crate::locator::Locator;
use crate::reference_table::{ReferenceTable, ReferenceTableConfig};

const MAX_CONCURRENCY: usize = 8;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Backoff before retry number `attempt` (1-based): 200ms, 400ms, 800ms...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100 * (1 << attempt.min(6)))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Fetches configured sources relative to a base URL.
pub struct SourceFetcher {
    client: Client,
    base_url: String,
}

impl SourceFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoadError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, client))
    }

    /// Use a preconfigured client (proxies, TLS roots, timeouts).
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URLs pass through; anything else is joined to the base URL.
    pub fn resolve_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.base_url, location.trim_start_matches('/'))
        }
    }

    async fn fetch_text(&self, location: &str) -> Result<String> {
        let url = self.resolve_url(location);
        let start = Instant::now();
        let mut retries = 0;

        loop {
            let failure = match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| LoadError::Http(format!("Body download error for {}: {}", url, e)))?;
                    debug!("[Fetch {}] {} bytes in {:?}", url, body.len(), start.elapsed());
                    return Ok(body);
                }
                Ok(resp) if is_retryable(resp.status()) => format!("HTTP {}", resp.status()),
                Ok(resp) => return Err(LoadError::Http(format!("HTTP {} for {}", resp.status(), url))),
                Err(e) => format!("Request error: {}", e),
            };

            retries += 1;
            if retries > MAX_RETRIES {
                return Err(LoadError::Http(format!("{} for {} (after {} retries)", failure, url, MAX_RETRIES)));
            }

            let wait = backoff(retries);
            warn!("[Fetch {}] {}, retry {} after {:?}", url, failure, retries, wait);
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_route(&self, source: &RouteSource) -> Result<Route> {
        let text = self.fetch_text(&source.location).await?;
        Route::from_source(&source.route_id, &text)
    }

    /// Fetch and build every configured route. The store keeps configuration
    /// order regardless of completion order.
    pub async fn fetch_route_store(&self, sources: &[RouteSource]) -> RouteStore {
        let start = Instant::now();

        let mut results: Vec<(usize, Option<Route>)> = stream::iter(sources.iter().enumerate())
            .map(|(idx, source)| async move {
                match self.fetch_route(source).await {
                    Ok(route) => (idx, Some(route)),
                    Err(e) => {
                        warn!("Route {} ({}) not loaded: {}", source.route_id, source.location, e);
                        (idx, None)
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENCY)
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);
        let store: RouteStore = results.into_iter().filter_map(|(_, route)| route).collect();

        info!(
            "Fetched {}/{} routes in {:.2}s: {:?}",
            store.len(),
            sources.len(),
            start.elapsed().as_secs_f64(),
            store.route_ids()
        );
        store
    }

    /// Fetch the reference table; empty on any failure.
    pub async fn fetch_reference_table(&self, location: &str, config: &ReferenceTableConfig) -> ReferenceTable {
        let parsed = match self.fetch_text(location).await {
            Ok(text) => ReferenceTable::from_csv_str(&text, config),
            Err(e) => Err(e),
        };

        parsed.unwrap_or_else(|e| {
            error!("Reference table {} not loaded: {}", location, e);
            ReferenceTable::empty()
        })
    }

    /// Fetch both stores concurrently, installing each as soon as it is built.
    pub async fn load_into(&self, locator: &Locator, config: &SourceConfig) {
        let routes = async {
            locator.install_routes(self.fetch_route_store(&config.routes).await);
        };
        let table = async {
            locator.install_reference_table(
                self.fetch_reference_table(&config.reference_table, &config.table).await,
            );
        };
        futures::join!(routes, table);
    }
}

/// Fetch everything and return a ready [`Locator`].
pub async fn fetch_locator(base_url: &str, config: &SourceConfig) -> Result<Locator> {
    let fetcher = SourceFetcher::new(base_url)?;
    let locator = Locator::new(config.resolver.clone());
    fetcher.load_into(&locator, config).await;
    Ok(locator)
}

/// Blocking wrapper for callers without a runtime (FFI, CLI).
///
/// Always returns a ready locator; if the runtime or client cannot be
/// created, both stores are installed empty and every query reports `?`.
pub fn fetch_locator_blocking(base_url: &str, config: &SourceConfig) -> Locator {
    use tokio::runtime::Builder;

    let result = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(LoadError::from)
        .and_then(|rt| rt.block_on(fetch_locator(base_url, config)));

    result.unwrap_or_else(|e| {
        error!("Failed to fetch sources from {}: {}", base_url, e);
        let locator = Locator::new(config.resolver.clone());
        locator.install_routes(RouteStore::new());
        locator.install_reference_table(ReferenceTable::empty());
        locator
    })
}
