//! # Route Locator
//!
//! Locates a GPS position along a small network of named routes and reports a
//! kilometer-post style reference: route id, nearest preceding reference post
//! and the offset in meters from that post (e.g. `4503 PR12+340m`).
//!
//! This library provides:
//! - A route geometry store built from KML or `lon,lat` token lists
//! - A per-route reference-post table built from delimited text
//! - A resolver chaining nearest route, along-route distance and post lookup
//! - A readiness-gated [`Locator`] handle for UI layers that poll
//!
//! ## Features
//!
//! - **`parallel`** - Build route geometries in parallel with rayon
//! - **`http`** - Fetch geometries and the reference table over HTTP
//! - **`config`** - serde derives and JSON source configuration
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_locator::{Locator, ReferenceTable, ReferenceTableConfig, ResolverConfig, RouteStore};
//!
//! // Two route segments, given as bare "lon,lat" token lists
//! let routes = RouteStore::from_sources([
//!     ("4503", "-74.0700,4.7000 -74.0700,4.7050 -74.0700,4.7100"),
//!     ("4505", "-74.1000,4.6000 -74.1050,4.6000"),
//! ]);
//!
//! let posts = ReferenceTable::from_csv_str(
//!     "TRAMO,PR,DISTANCIA\n4503,PR0,0\n4503,PR1,500\n",
//!     &ReferenceTableConfig::default(),
//! ).unwrap();
//!
//! let locator = Locator::new(ResolverConfig::default());
//! locator.install_routes(routes);
//! locator.install_reference_table(posts);
//!
//! let position = locator.locate(4.7051, -74.0701);
//! assert_eq!(position.route_id.as_deref(), Some("4503"));
//! assert_eq!(position.label, "PR1");
//! println!("{}", position); // 4503 PR1+56m
//! ```

pub mod config;
pub mod error;
pub mod geo_utils;
pub mod geometry;
pub mod kml;
pub mod loader;
pub mod locator;
pub mod reference_table;
pub mod resolver;

// HTTP module for source fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{fetch_locator, fetch_locator_blocking, SourceFetcher};

pub use config::{RouteSource, SourceConfig};
pub use error::LoadError;
pub use geometry::{Route, RoutePoint, RouteStore};
pub use loader::{load_locator, load_reference_table, load_route_store};
pub use locator::Locator;
pub use reference_table::{
    ReferencePostEntry, ReferencePostMatch, ReferenceTable, ReferenceTableConfig, UNKNOWN_LABEL,
};
pub use resolver::{PositionResolver, ResolvedPosition, ResolverConfig};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RouteLocatorRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_locator::GpsPoint;
/// let point = GpsPoint::new(4.7110, -74.0721); // Bogotá
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{info, warn};
    use std::sync::Arc;

    /// Geometry document for one route, already read by the host app.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct RouteGeometry {
        pub route_id: String,
        /// KML text or a whitespace-separated `lon,lat` token list
        pub source: String,
    }

    /// Locator handle owned by the mobile host.
    ///
    /// The host loads routes and the reference table (in any order, from any
    /// thread) and polls `locate` on every position update.
    #[derive(uniffi::Object)]
    pub struct FfiLocator {
        inner: Locator,
    }

    #[uniffi::export]
    impl FfiLocator {
        #[uniffi::constructor]
        pub fn new(config: ResolverConfig) -> Arc<Self> {
            init_logging();
            info!("[RouteLocatorRust] FfiLocator created (sample target {})", config.route_sample_target);
            Arc::new(Self { inner: Locator::new(config) })
        }

        /// Build and install all route geometries. Unparsable routes are skipped.
        pub fn load_routes(&self, geometries: Vec<RouteGeometry>) -> Vec<String> {
            info!("[RouteLocatorRust] load_routes called with {} geometries", geometries.len());
            let start = std::time::Instant::now();

            let sources: Vec<(String, String)> = geometries
                .into_iter()
                .map(|g| (g.route_id, g.source))
                .collect();
            let store = RouteStore::from_sources_parallel(&sources);
            let ids = store.route_ids();

            info!("[RouteLocatorRust] Built {} routes in {:?}", ids.len(), start.elapsed());
            self.inner.install_routes(store);
            ids
        }

        /// Parse and install the reference table. Returns false (and installs
        /// an empty table) when the header lacks the configured columns.
        pub fn load_reference_table(&self, csv_text: String, config: ReferenceTableConfig) -> bool {
            match ReferenceTable::from_csv_str(&csv_text, &config) {
                Ok(table) => {
                    self.inner.install_reference_table(table);
                    true
                }
                Err(e) => {
                    warn!("[RouteLocatorRust] Reference table rejected: {}", e);
                    self.inner.install_reference_table(ReferenceTable::empty());
                    false
                }
            }
        }

        pub fn is_ready(&self) -> bool {
            self.inner.is_ready()
        }

        pub fn routes_ready(&self) -> bool {
            self.inner.routes_ready()
        }

        pub fn reference_table_ready(&self) -> bool {
            self.inner.reference_table_ready()
        }

        pub fn locate(&self, lat: f64, lng: f64) -> ResolvedPosition {
            self.inner.locate(lat, lng)
        }

        pub fn nearest_route(&self, lat: f64, lng: f64) -> Option<String> {
            self.inner.nearest_route(lat, lng)
        }

        pub fn distance_along_route(&self, route_id: String, lat: f64, lng: f64) -> Option<f64> {
            self.inner.distance_along_route(&route_id, lat, lng)
        }

        pub fn resolve_reference_post(&self, route_id: String, distance_meters: f64) -> ReferencePostMatch {
            self.inner.resolve_reference_post(&route_id, distance_meters)
        }
    }

    /// Get default resolver configuration.
    #[uniffi::export]
    pub fn default_resolver_config() -> ResolverConfig {
        ResolverConfig::default()
    }

    /// Get default reference table layout (TRAMO, PR, DISTANCIA).
    #[uniffi::export]
    pub fn default_reference_table_config() -> ReferenceTableConfig {
        ReferenceTableConfig::default()
    }

    /// Kilometer-post text for annotations, e.g. `PR12+340m`.
    #[uniffi::export]
    pub fn format_reference(position: ResolvedPosition) -> String {
        position.reference_text()
    }

    /// Fetch the default network from `base_url` and return a ready locator.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn fetch_default_locator(base_url: String) -> Arc<FfiLocator> {
        init_logging();
        info!("[RouteLocatorRust] fetch_default_locator from {}", base_url);
        let inner = crate::http::fetch_locator_blocking(&base_url, &SourceConfig::default());
        Arc::new(FfiLocator { inner })
    }
}

// ============================================================================
// Tests
// ============================================================================
