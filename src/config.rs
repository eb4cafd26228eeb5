//! Source configuration: which routes to load and where the data lives.
//!
//! Locations are file names (or paths) relative to a data directory for the
//! filesystem loader, and relative to a base URL for the HTTP fetcher.
//! Absolute paths and absolute URLs are used as-is.

use crate::reference_table::ReferenceTableConfig;
use crate::resolver::ResolverConfig;

/// One configured route and the resource holding its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteSource {
    pub route_id: String,
    /// KML document or bare `lon,lat` token list
    pub location: String,
}

impl RouteSource {
    pub fn new(route_id: &str, location: &str) -> Self {
        Self {
            route_id: route_id.to_string(),
            location: location.to_string(),
        }
    }
}

/// Everything needed to build a [`crate::Locator`] from external data.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SourceConfig {
    /// Routes in priority order; earlier routes win nearest-route ties
    pub routes: Vec<RouteSource>,
    /// Location of the reference-post table
    pub reference_table: String,
    /// Column layout of the reference-post table
    pub table: ReferenceTableConfig,
    /// Query-time settings
    pub resolver: ResolverConfig,
}

impl Default for SourceConfig {
    /// The deployed network: four route segments and `PRs.csv`.
    fn default() -> Self {
        Self {
            routes: vec![
                RouteSource::new("4503", "4503.kml"),
                RouteSource::new("4505", "4505.kml"),
                RouteSource::new("45HLB", "45HLB.kml"),
                RouteSource::new("45HLC", "ruta_densa_10m_45HLC.kml"),
            ],
            reference_table: "PRs.csv".to_string(),
            table: ReferenceTableConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

#[cfg(feature = "config")]
impl SourceConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
