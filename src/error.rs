//! Errors raised while loading route geometries and the reference-post table.
//!
//! Nothing in the query path returns these: a failed load leaves its route or
//! table absent and the resolver answers with `None` / the unknown sentinel.

/// Error types for the loaders
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("KML parsing error: {0}")]
    Kml(#[from] roxmltree::Error),

    #[error("Reference table is missing expected columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Geometry source has no <coordinates> element")]
    NoCoordinates,

    #[error("No valid points for route {route_id}")]
    NoValidPoints { route_id: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
