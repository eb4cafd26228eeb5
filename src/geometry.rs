//! # Route Geometry Store
//!
//! Turns raw `lon,lat[,elev]` vertex tokens into distance-annotated routes.
//!
//! Every accepted vertex carries the cumulative haversine distance from the
//! first accepted vertex, so along-route position is a lookup rather than a
//! computation at query time. Malformed tokens are dropped before distances
//! are accumulated: the chain continues between the accepted neighbours.
//!
//! Routes are held in a [`RouteStore`] that keeps insertion order. The
//! resolver walks routes in that order, so it doubles as the tie-break when
//! two routes are equally close to an observer.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::error::{LoadError, Result};
use crate::geo_utils::{self, haversine_distance};
use crate::kml;
use crate::{Bounds, GpsPoint};

/// One vertex of a route's centerline.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the first vertex along the route, in meters
    pub cumulative_distance_meters: f64,
}

impl RoutePoint {
    pub fn gps(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A named, distance-annotated route centerline. Immutable once built.
#[derive(Debug, Clone)]
pub struct Route {
    route_id: String,
    points: Vec<RoutePoint>,
}

impl Route {
    /// Build a route from already-parsed vertices.
    ///
    /// Invalid points (non-finite or out of range) are skipped. Returns `None`
    /// if no valid point remains.
    ///
    /// # Example
    /// ```
    /// use route_locator::{GpsPoint, Route};
    ///
    /// let route = Route::from_points("4503", &[
    ///     GpsPoint::new(0.0, 0.0),
    ///     GpsPoint::new(f64::NAN, 0.0),
    ///     GpsPoint::new(0.0, 0.01),
    /// ]).unwrap();
    ///
    /// assert_eq!(route.points().len(), 2);
    /// assert_eq!(route.points()[0].cumulative_distance_meters, 0.0);
    /// assert!((route.total_length_meters() - 1112.0).abs() < 1.0);
    /// ```
    pub fn from_points(route_id: &str, points: &[GpsPoint]) -> Option<Self> {
        let valid: Vec<GpsPoint> = points.iter().copied().filter(GpsPoint::is_valid).collect();
        if valid.is_empty() {
            return None;
        }

        let cumulative = geo_utils::cumulative_distances(&valid);
        let points = valid
            .iter()
            .zip(cumulative)
            .map(|(p, d)| RoutePoint {
                latitude: p.latitude,
                longitude: p.longitude,
                cumulative_distance_meters: d,
            })
            .collect();

        Some(Self {
            route_id: route_id.to_string(),
            points,
        })
    }

    /// Build a route from raw `lon,lat[,elev]` tokens.
    ///
    /// Tokens that do not parse are skipped; distance accumulates only
    /// between consecutive accepted points.
    pub fn from_tokens<'a, I>(route_id: &str, tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut accepted = Vec::new();
        let mut skipped = 0usize;

        for token in tokens {
            match parse_coordinate_token(token) {
                Some(p) => accepted.push(p),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Route {}: skipped {} malformed coordinate tokens", route_id, skipped);
        }

        Self::from_points(route_id, &accepted).ok_or_else(|| LoadError::NoValidPoints {
            route_id: route_id.to_string(),
        })
    }

    /// Build a route from a geometry document (KML or bare token list).
    pub fn from_source(route_id: &str, source: &str) -> Result<Self> {
        let text = kml::coordinate_text(source)?;
        let route = Self::from_tokens(route_id, kml::coordinate_tokens(&text))?;
        if let Some(b) = route.bounds() {
            info!(
                "Route {}: {} points, length ~{:.0} m, bounds lat [{:.5}, {:.5}] lng [{:.5}, {:.5}]",
                route_id,
                route.points.len(),
                route.total_length_meters(),
                b.min_lat,
                b.max_lat,
                b.min_lng,
                b.max_lng
            );
        }
        Ok(route)
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// Vertices in route order; never empty.
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Cumulative distance of the last vertex.
    pub fn total_length_meters(&self) -> f64 {
        self.points
            .last()
            .map_or(0.0, |p| p.cumulative_distance_meters)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let gps: Vec<GpsPoint> = self.points.iter().map(RoutePoint::gps).collect();
        geo_utils::compute_bounds(&gps)
    }

    /// Index of the vertex nearest to `point` among every `stride`-th vertex
    /// (starting at 0), with its haversine distance. The first vertex wins
    /// exact ties.
    pub(crate) fn nearest_vertex(&self, point: &GpsPoint, stride: usize) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, p) in self.points.iter().enumerate().step_by(stride.max(1)) {
            let d = haversine_distance(point, &p.gps());
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((idx, d));
            }
        }

        best
    }
}

/// Parse one `lon,lat[,elev]` token. Elevation and any further fields are
/// ignored.
///
/// # Example
/// ```
/// use route_locator::geometry::parse_coordinate_token;
///
/// let p = parse_coordinate_token("-74.0721,4.7110,2600").unwrap();
/// assert_eq!((p.latitude, p.longitude), (4.7110, -74.0721));
/// assert!(parse_coordinate_token("abc,def").is_none());
/// assert!(parse_coordinate_token("-74.0721").is_none());
/// ```
pub fn parse_coordinate_token(token: &str) -> Option<GpsPoint> {
    let mut parts = token.split(',');
    let lng: f64 = parts.next()?.trim().parse().ok()?;
    let lat: f64 = parts.next()?.trim().parse().ok()?;

    let point = GpsPoint::new(lat, lng);
    point.is_valid().then_some(point)
}

/// Ordered collection of built routes.
///
/// Iteration follows insertion order. Re-inserting an existing route id
/// replaces the route but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct RouteStore {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, route: Route) {
        match self.index.get(route.route_id()) {
            Some(&idx) => {
                warn!("Route {} loaded twice, keeping the latest geometry", route.route_id());
                self.routes[idx] = route;
            }
            None => {
                self.index.insert(route.route_id().to_string(), self.routes.len());
                self.routes.push(route);
            }
        }
    }

    /// Build a store from `(route_id, geometry source)` pairs.
    ///
    /// A source that fails to load is logged and left out; the rest still
    /// build.
    pub fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut store = Self::new();
        for (route_id, source) in sources {
            match Route::from_source(route_id, source) {
                Ok(route) => store.insert(route),
                Err(e) => warn!("Route {} not loaded: {}", route_id, e),
            }
        }
        store
    }

    /// Parallel variant of [`RouteStore::from_sources`].
    ///
    /// Routes are parsed with rayon; the resulting store keeps the input order.
    #[cfg(feature = "parallel")]
    pub fn from_sources_parallel(sources: &[(String, String)]) -> Self {
        use rayon::prelude::*;

        let built: Vec<Option<Route>> = sources
            .par_iter()
            .map(|(route_id, source)| match Route::from_source(route_id, source) {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!("Route {} not loaded: {}", route_id, e);
                    None
                }
            })
            .collect();

        let mut store = Self::new();
        for route in built.into_iter().flatten() {
            store.insert(route);
        }
        store
    }

    pub fn get(&self, route_id: &str) -> Option<&Route> {
        self.index.get(route_id).map(|&idx| &self.routes[idx])
    }

    /// Routes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.route_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RouteStore {
    fn from_iter<T: IntoIterator<Item = Route>>(iter: T) -> Self {
        let mut store = Self::new();
        for route in iter {
            store.insert(route);
        }
        store
    }
}
