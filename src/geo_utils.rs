//! # Geographic Utilities
//!
//! Distance and bounds helpers shared by the geometry store and the resolver.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`cumulative_distances`] | Running along-track distance for every vertex |
//! | [`compute_bounds`] | Bounding box of a track |
//!
//! ## Example
//!
//! ```rust
//! use route_locator::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(4.7110, -74.0721),  // Bogotá
//!     GpsPoint::new(4.7120, -74.0721),
//!     GpsPoint::new(4.7130, -74.0721),
//! ];
//!
//! let cumulative = geo_utils::cumulative_distances(&track);
//! assert_eq!(cumulative[0], 0.0);
//! assert!(cumulative[2] > cumulative[1]);
//! ```
//!
//! ## Earth Model
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_METERS`] (6 371 000 m). Reference-post tables are surveyed
//! against that radius, so it is fixed here instead of using the GRS80 mean
//! radius that `geo::Haversine` applies.

use geo::{BoundingRect, Coord, LineString};
use crate::{GpsPoint, Bounds};

/// Sphere radius used for every distance in this crate.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters on a sphere of radius [`EARTH_RADIUS_METERS`].
/// Identical points return exactly `0.0`.
///
/// # Example
///
/// ```rust
/// use route_locator::{GpsPoint, geo_utils};
///
/// let a = GpsPoint::new(0.0, 0.0);
/// let b = GpsPoint::new(0.0, 0.01);
///
/// let distance = geo_utils::haversine_distance(&a, &b);
/// assert!((distance - 1112.0).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lng = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Running along-track distance for every vertex of a track.
///
/// The returned vector has the same length as `points`; the first value is
/// exactly `0.0` and every following value adds the haversine distance to the
/// previous vertex, so the sequence never decreases.
pub fn cumulative_distances(points: &[GpsPoint]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    let mut prev: Option<&GpsPoint> = None;

    for p in points {
        if let Some(prev) = prev {
            acc += haversine_distance(prev, p);
        }
        out.push(acc);
        prev = Some(p);
    }

    out
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// Returns `None` for an empty track.
///
/// # Example
///
/// ```rust
/// use route_locator::{GpsPoint, geo_utils};
///
/// let track = vec![
///     GpsPoint::new(4.70, -74.08),
///     GpsPoint::new(4.72, -74.06),
///     GpsPoint::new(4.71, -74.07),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track).unwrap();
/// assert_eq!(bounds.min_lat, 4.70);
/// assert_eq!(bounds.max_lng, -74.06);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect();

    let rect = line.bounding_rect()?;

    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
