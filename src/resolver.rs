//! # Position Resolver
//!
//! Query-time half of the crate. Given a live coordinate it answers three
//! questions, each usable on its own:
//!
//! 1. [`PositionResolver::nearest_route`] - which route is the observer on?
//!    Routes are compared on a thinned sample of their vertices (about
//!    `route_sample_target` per route), which is enough to tell apart routes
//!    that are spatially well separated.
//! 2. [`PositionResolver::distance_along_route`] - how far along that route?
//!    Scans every vertex, since this value feeds the reference-post lookup
//!    directly and sampling error would show up as a systematic offset.
//! 3. [`PositionResolver::resolve_reference_post`] - which post precedes that
//!    distance, and by how many meters?
//!
//! [`PositionResolver::locate`] chains all three and is recomputed from the
//! raw coordinate on every call; no state is carried between calls.

use std::fmt;
use std::sync::Arc;

use crate::geometry::RouteStore;
use crate::reference_table::{ReferencePostMatch, ReferenceTable, UNKNOWN_LABEL};
use crate::GpsPoint;

/// Configuration for position resolution.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// Approximate number of vertices compared per route when picking the
    /// nearest route. The sampling stride is `max(1, point_count / target)`.
    /// 0 disables sampling. Default: 200
    pub route_sample_target: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            route_sample_target: 200,
        }
    }
}

/// Outcome of locating one coordinate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvedPosition {
    /// Nearest route, `None` when no route is loaded
    pub route_id: Option<String>,
    /// Distance from the route start to the nearest vertex, in meters
    pub distance_meters: Option<f64>,
    /// Reference-post label, `"?"` when unresolved
    pub label: String,
    /// Meters past the reference post
    pub offset_meters: u32,
}

impl ResolvedPosition {
    /// Nothing resolved: no route, no distance, `?+0m`.
    pub fn unknown() -> Self {
        Self {
            route_id: None,
            distance_meters: None,
            label: UNKNOWN_LABEL.to_string(),
            offset_meters: 0,
        }
    }

    /// True when a reference post was found.
    pub fn is_resolved(&self) -> bool {
        self.route_id.is_some() && self.label != UNKNOWN_LABEL
    }

    /// Kilometer-post text as printed on annotations, e.g. `PR12+340m`.
    pub fn reference_text(&self) -> String {
        format!("{}+{}m", self.label, self.offset_meters)
    }
}

impl fmt::Display for ResolvedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.route_id {
            Some(route_id) => write!(f, "{} {}", route_id, self.reference_text()),
            None => write!(f, "{}", self.reference_text()),
        }
    }
}

/// Sampling stride for a route of `point_count` vertices.
#[inline]
pub(crate) fn sample_stride(point_count: usize, sample_target: u32) -> usize {
    if sample_target == 0 {
        return 1;
    }
    (point_count / sample_target as usize).max(1)
}

/// Read-only resolver over a built route store and reference table.
#[derive(Debug, Clone)]
pub struct PositionResolver {
    routes: Arc<RouteStore>,
    posts: Arc<ReferenceTable>,
    config: ResolverConfig,
}

impl PositionResolver {
    pub fn new(routes: Arc<RouteStore>, posts: Arc<ReferenceTable>, config: ResolverConfig) -> Self {
        Self { routes, posts, config }
    }

    pub fn routes(&self) -> &RouteStore {
        &self.routes
    }

    pub fn reference_table(&self) -> &ReferenceTable {
        &self.posts
    }

    /// Route whose sampled vertices come closest to `(lat, lng)`.
    ///
    /// The first route in store order wins exact ties. Returns `None` when no
    /// route is loaded or the coordinate is invalid.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use route_locator::{PositionResolver, ReferenceTable, ResolverConfig, RouteStore};
    ///
    /// let routes = RouteStore::from_sources([("A", "0,0 0,0.01"), ("B", "1,1 1,1.01")]);
    /// let resolver = PositionResolver::new(
    ///     Arc::new(routes),
    ///     Arc::new(ReferenceTable::empty()),
    ///     ResolverConfig::default(),
    /// );
    ///
    /// assert_eq!(resolver.nearest_route(1.005, 1.0), Some("B"));
    /// ```
    pub fn nearest_route(&self, lat: f64, lng: f64) -> Option<&str> {
        let target = GpsPoint::new(lat, lng);
        if !target.is_valid() {
            return None;
        }

        let mut best: Option<(&str, f64)> = None;

        for route in self.routes.iter() {
            let stride = sample_stride(route.points().len(), self.config.route_sample_target);
            if let Some((_, d)) = route.nearest_vertex(&target, stride) {
                if best.map_or(true, |(_, best_d)| d < best_d) {
                    best = Some((route.route_id(), d));
                }
            }
        }

        best.map(|(id, _)| id)
    }

    /// Cumulative distance of the vertex of `route_id` nearest to `(lat, lng)`.
    ///
    /// Every vertex is checked. Returns `None` for an unknown route or an
    /// invalid coordinate.
    pub fn distance_along_route(&self, route_id: &str, lat: f64, lng: f64) -> Option<f64> {
        let target = GpsPoint::new(lat, lng);
        if !target.is_valid() {
            return None;
        }

        let route = self.routes.get(route_id)?;
        let (idx, _) = route.nearest_vertex(&target, 1)?;
        Some(route.points()[idx].cumulative_distance_meters)
    }

    /// Reference post at or before `distance_meters` on `route_id`.
    pub fn resolve_reference_post(&self, route_id: &str, distance_meters: f64) -> ReferencePostMatch {
        self.posts.resolve(route_id, distance_meters)
    }

    /// Nearest route, along-route distance and reference post for a coordinate.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use route_locator::{
    ///     PositionResolver, ReferenceTable, ReferenceTableConfig, ResolverConfig, RouteStore,
    /// };
    ///
    /// // 11 vertices ~111 m apart along the equator
    /// let tokens: Vec<String> = (0..=10).map(|i| format!("{},0", i as f64 * 0.001)).collect();
    /// let geometry = tokens.join(" ");
    /// let routes = RouteStore::from_sources([("A", geometry.as_str())]);
    ///
    /// let posts = ReferenceTable::from_csv_str(
    ///     "TRAMO,PR,DISTANCIA\nA,PR0,0\nA,PR1,500\n",
    ///     &ReferenceTableConfig::default(),
    /// ).unwrap();
    ///
    /// let resolver = PositionResolver::new(Arc::new(routes), Arc::new(posts), ResolverConfig::default());
    /// let position = resolver.locate(0.0001, 0.005);
    ///
    /// assert_eq!(position.route_id.as_deref(), Some("A"));
    /// assert_eq!(position.reference_text(), "PR1+56m");
    /// ```
    pub fn locate(&self, lat: f64, lng: f64) -> ResolvedPosition {
        let Some(route_id) = self.nearest_route(lat, lng) else {
            return ResolvedPosition::unknown();
        };

        let Some(distance) = self.distance_along_route(route_id, lat, lng) else {
            return ResolvedPosition {
                route_id: Some(route_id.to_string()),
                ..ResolvedPosition::unknown()
            };
        };

        let post = self.resolve_reference_post(route_id, distance);

        ResolvedPosition {
            route_id: Some(route_id.to_string()),
            distance_meters: Some(distance),
            label: post.label,
            offset_meters: post.offset_meters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Route;
    use crate::reference_table::ReferenceTableConfig;

    /// Straight route along the equator, one vertex every 0.001 degrees (~111 m).
    fn equator_route(id: &str, lng_start: f64, vertices: usize) -> Route {
        let points: Vec<GpsPoint> = (0..vertices)
            .map(|i| GpsPoint::new(0.0, lng_start + i as f64 * 0.001))
            .collect();
        Route::from_points(id, &points).unwrap()
    }

    fn resolver(routes: Vec<Route>, csv: &str) -> PositionResolver {
        let posts = ReferenceTable::from_csv_str(csv, &ReferenceTableConfig::default()).unwrap();
        PositionResolver::new(
            Arc::new(routes.into_iter().collect()),
            Arc::new(posts),
            ResolverConfig::default(),
        )
    }

    const POSTS: &str = "TRAMO,PR,DISTANCIA\nA,PR0,0\nA,PR1,1000\nA,PR2,2500\n";

    #[test]
    fn test_sample_stride() {
        assert_eq!(sample_stride(0, 200), 1);
        assert_eq!(sample_stride(199, 200), 1);
        assert_eq!(sample_stride(400, 200), 2);
        assert_eq!(sample_stride(1999, 200), 9);
        assert_eq!(sample_stride(5000, 0), 1);
    }

    #[test]
    fn test_nearest_route_none_iff_empty() {
        let empty = resolver(vec![], POSTS);
        assert_eq!(empty.nearest_route(0.0, 0.0), None);

        let one = resolver(vec![equator_route("A", 0.0, 2)], POSTS);
        assert_eq!(one.nearest_route(45.0, 120.0), Some("A"));
    }

    #[test]
    fn test_nearest_route_picks_closest() {
        let r = resolver(
            vec![equator_route("A", 0.0, 11), equator_route("B", 1.0, 11)],
            POSTS,
        );
        assert_eq!(r.nearest_route(0.001, 0.004), Some("A"));
        assert_eq!(r.nearest_route(-0.001, 1.004), Some("B"));
    }

    #[test]
    fn test_nearest_route_tie_keeps_first_in_store_order() {
        let a = Route::from_points("A", &[GpsPoint::new(0.01, 0.0)]).unwrap();
        let b = Route::from_points("B", &[GpsPoint::new(-0.01, 0.0)]).unwrap();

        let ab = resolver(vec![a.clone(), b.clone()], POSTS);
        let ba = resolver(vec![b, a], POSTS);

        assert_eq!(ab.nearest_route(0.0, 0.0), Some("A"));
        assert_eq!(ba.nearest_route(0.0, 0.0), Some("B"));
    }

    #[test]
    fn test_nearest_route_uses_sampling() {
        // "A" has 1000 vertices; with a target of 200 only every 5th is compared.
        // The observer sits on vertex 3 of A, but B's only vertex is closer
        // than A's sampled vertices 0 and 5.
        let a = equator_route("A", 0.0, 1000);
        let b = Route::from_points("B", &[GpsPoint::new(0.0002, 0.003)]).unwrap();
        let r = resolver(vec![a, b], POSTS);

        assert_eq!(r.nearest_route(0.0, 0.003), Some("B"));
        // Exhaustive distance on A still finds vertex 3
        let d = r.distance_along_route("A", 0.0, 0.003).unwrap();
        assert!((d - 333.58).abs() < 0.1);
    }

    #[test]
    fn test_nearest_route_invalid_coordinate() {
        let r = resolver(vec![equator_route("A", 0.0, 5)], POSTS);
        assert_eq!(r.nearest_route(f64::NAN, 0.0), None);
        assert_eq!(r.nearest_route(0.0, f64::INFINITY), None);
        assert_eq!(r.nearest_route(91.0, 0.0), None);
    }

    #[test]
    fn test_distance_along_route_vertex_round_trip() {
        let route = equator_route("A", 0.0, 25);
        let r = resolver(vec![route.clone()], POSTS);

        for p in route.points() {
            assert_eq!(
                r.distance_along_route("A", p.latitude, p.longitude),
                Some(p.cumulative_distance_meters)
            );
        }
    }

    #[test]
    fn test_distance_along_route_midpoint() {
        let r = resolver(vec![equator_route("A", 0.0, 11)], POSTS);
        let d = r.distance_along_route("A", 0.0, 0.005).unwrap();
        assert!((d - 556.0).abs() < 1.0);
    }

    #[test]
    fn test_distance_along_route_unknown_route() {
        let r = resolver(vec![equator_route("A", 0.0, 3)], POSTS);
        assert_eq!(r.distance_along_route("Z", 0.0, 0.0), None);
        assert_eq!(r.distance_along_route("A", f64::NAN, 0.0), None);
    }

    #[test]
    fn test_locate_composite() {
        let r = resolver(vec![equator_route("A", 0.0, 40)], POSTS);

        // Vertex 15 is ~1668 m along
        let pos = r.locate(0.0001, 0.015);
        assert_eq!(pos.route_id.as_deref(), Some("A"));
        assert_eq!(pos.label, "PR1");
        assert_eq!(pos.offset_meters, 668);
        assert!(pos.is_resolved());
        assert_eq!(pos.to_string(), "A PR1+668m");
    }

    #[test]
    fn test_locate_without_routes_is_unknown() {
        let r = resolver(vec![], POSTS);
        let pos = r.locate(0.0, 0.0);
        assert_eq!(pos, ResolvedPosition::unknown());
        assert_eq!(pos.reference_text(), "?+0m");
        assert!(!pos.is_resolved());
    }

    #[test]
    fn test_locate_route_without_posts() {
        let r = resolver(vec![equator_route("B", 0.0, 5)], POSTS);
        let pos = r.locate(0.0, 0.002);
        assert_eq!(pos.route_id.as_deref(), Some("B"));
        assert!(pos.distance_meters.is_some());
        assert_eq!(pos.label, "?");
        assert_eq!(pos.offset_meters, 0);
        assert!(!pos.is_resolved());
    }

    #[test]
    fn test_locate_with_failed_table_is_unknown() {
        let posts = ReferenceTable::from_csv_str("TRAMO,PR\nA,PR0\n", &ReferenceTableConfig::default())
            .unwrap_or_else(|_| ReferenceTable::empty());
        let r = PositionResolver::new(
            Arc::new(vec![equator_route("A", 0.0, 5)].into_iter().collect()),
            Arc::new(posts),
            ResolverConfig::default(),
        );
        let pos = r.locate(0.0, 0.001);
        assert_eq!(pos.label, "?");
        assert_eq!(pos.offset_meters, 0);
    }
}
