//! Readiness-gated handle around the two stores.
//!
//! The route store and the reference table load independently, possibly on
//! different tasks. [`Locator`] owns the current snapshot of both and answers
//! queries against it. Until both stores have been installed every query
//! returns `None` or the unknown sentinel, so a caller polling on a timer can
//! start querying right away and simply retry.
//!
//! Installing a store replaces the snapshot as a whole. Readers clone the
//! `Arc`s of the snapshot they started with and never see a store that is
//! half built or half replaced.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

use crate::geometry::RouteStore;
use crate::reference_table::{ReferencePostMatch, ReferenceTable};
use crate::resolver::{PositionResolver, ResolvedPosition, ResolverConfig};

/// Stores installed so far. `None` means "load not finished yet".
#[derive(Debug, Clone, Default)]
struct Snapshot {
    routes: Option<Arc<RouteStore>>,
    posts: Option<Arc<ReferenceTable>>,
}

impl Snapshot {
    fn is_ready(&self) -> bool {
        self.routes.is_some() && self.posts.is_some()
    }
}

/// Shared entry point for presentation layers (HUD, photo annotation, CLI).
///
/// # Example
/// ```
/// use route_locator::{Locator, ReferenceTable, ResolverConfig, RouteStore};
///
/// let locator = Locator::new(ResolverConfig::default());
/// assert!(!locator.is_ready());
/// assert_eq!(locator.locate(0.0, 0.0).label, "?");
///
/// locator.install_routes(RouteStore::from_sources([("A", "0,0 0,0.01")]));
/// locator.install_reference_table(ReferenceTable::empty());
///
/// assert!(locator.is_ready());
/// assert_eq!(locator.locate(0.0, 0.0).route_id.as_deref(), Some("A"));
/// ```
#[derive(Debug)]
pub struct Locator {
    config: ResolverConfig,
    state: watch::Sender<Snapshot>,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl Locator {
    pub fn new(config: ResolverConfig) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self { config, state }
    }

    /// Swap in a fully built route store. Marks routes as ready.
    pub fn install_routes(&self, routes: RouteStore) {
        info!("Installing {} routes: {:?}", routes.len(), routes.route_ids());
        let routes = Arc::new(routes);
        self.state.send_modify(|s| s.routes = Some(routes));
    }

    /// Swap in a reference table. Marks the table as ready.
    ///
    /// A table that failed to load should be installed as
    /// [`ReferenceTable::empty`] so that resolution degrades to `?` instead of
    /// waiting forever.
    pub fn install_reference_table(&self, posts: ReferenceTable) {
        info!("Installing reference table with {} posts", posts.len());
        let posts = Arc::new(posts);
        self.state.send_modify(|s| s.posts = Some(posts));
    }

    pub fn routes_ready(&self) -> bool {
        self.state.borrow().routes.is_some()
    }

    pub fn reference_table_ready(&self) -> bool {
        self.state.borrow().posts.is_some()
    }

    /// Both stores installed.
    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    /// Resolves once both stores are installed.
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(Snapshot::is_ready).await;
    }

    /// Resolver over the current snapshot, if ready.
    pub fn resolver(&self) -> Option<PositionResolver> {
        let snapshot = self.state.borrow().clone();
        match (snapshot.routes, snapshot.posts) {
            (Some(routes), Some(posts)) => {
                Some(PositionResolver::new(routes, posts, self.config.clone()))
            }
            _ => None,
        }
    }

    /// Full lookup for a coordinate update; unknown until ready.
    pub fn locate(&self, lat: f64, lng: f64) -> ResolvedPosition {
        self.resolver()
            .map_or_else(ResolvedPosition::unknown, |r| r.locate(lat, lng))
    }

    pub fn nearest_route(&self, lat: f64, lng: f64) -> Option<String> {
        self.resolver()?.nearest_route(lat, lng).map(str::to_string)
    }

    pub fn distance_along_route(&self, route_id: &str, lat: f64, lng: f64) -> Option<f64> {
        self.resolver()?.distance_along_route(route_id, lat, lng)
    }

    pub fn resolve_reference_post(&self, route_id: &str, distance_meters: f64) -> ReferencePostMatch {
        self.resolver()
            .map_or_else(ReferencePostMatch::unknown, |r| {
                r.resolve_reference_post(route_id, distance_meters)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_table::ReferenceTableConfig;
    use std::time::Duration;

    fn routes() -> RouteStore {
        RouteStore::from_sources([("A", "0,0 0.001,0 0.002,0 0.003,0 0.004,0")])
    }

    fn posts() -> ReferenceTable {
        ReferenceTable::from_csv_str(
            "TRAMO,PR,DISTANCIA\nA,PR0,0\nA,PR1,200\n",
            &ReferenceTableConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_queries_before_ready_are_unknown() {
        let locator = Locator::default();
        locator.install_routes(routes());

        assert!(locator.routes_ready());
        assert!(!locator.reference_table_ready());
        assert!(!locator.is_ready());
        assert_eq!(locator.locate(0.0, 0.003), ResolvedPosition::unknown());
        assert_eq!(locator.nearest_route(0.0, 0.003), None);
        assert_eq!(locator.distance_along_route("A", 0.0, 0.003), None);
        assert!(locator.resolve_reference_post("A", 100.0).is_unknown());
    }

    #[test]
    fn test_locate_after_ready() {
        let locator = Locator::default();
        locator.install_reference_table(posts());
        locator.install_routes(routes());

        let pos = locator.locate(0.0, 0.003);
        assert_eq!(pos.route_id.as_deref(), Some("A"));
        assert_eq!(pos.label, "PR1");
        assert_eq!(pos.offset_meters, 134);
        assert_eq!(locator.nearest_route(0.0, 0.003).as_deref(), Some("A"));
        assert_eq!(locator.resolve_reference_post("A", 250.0).offset_meters, 50);
    }

    #[test]
    fn test_reinstall_swaps_whole_store() {
        let locator = Locator::default();
        locator.install_reference_table(ReferenceTable::empty());
        locator.install_routes(routes());

        let before = locator.resolver().unwrap();
        locator.install_routes(RouteStore::from_sources([("B", "10,10 10,10.01")]));

        // The old resolver keeps its snapshot
        assert_eq!(before.nearest_route(0.0, 0.0), Some("A"));
        assert_eq!(locator.nearest_route(0.0, 0.0).as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_both_installs() {
        let locator = Arc::new(Locator::default());

        let loader = {
            let locator = Arc::clone(&locator);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                locator.install_routes(routes());
                tokio::time::sleep(Duration::from_millis(20)).await;
                locator.install_reference_table(posts());
            })
        };

        tokio::time::timeout(Duration::from_secs(5), locator.wait_ready())
            .await
            .expect("locator never became ready");

        assert!(locator.is_ready());
        loader.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_returns_immediately_when_ready() {
        let locator = Locator::default();
        locator.install_routes(routes());
        locator.install_reference_table(posts());
        locator.wait_ready().await;
        assert!(locator.is_ready());
    }
}
