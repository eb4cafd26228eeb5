//! Build a dense route network in parallel and time nearest-route queries.
//!
//! Run with: cargo run --example parallel_load --features parallel

use std::sync::Arc;
use std::time::Instant;

use route_locator::{PositionResolver, ReferenceTable, ResolverConfig, RouteStore};

fn main() {
    // 12 routes of 5000 vertices each (~10 m spacing)
    let sources: Vec<(String, String)> = (0..12)
        .map(|r| {
            let lng = -74.0 + r as f64 * 0.05;
            let tokens: Vec<String> = (0..5000)
                .map(|i| format!("{:.6},{:.6},0", lng, 4.5 + i as f64 * 0.00009))
                .collect();
            (format!("R{:02}", r), tokens.join(" "))
        })
        .collect();

    let start = Instant::now();
    let store = RouteStore::from_sources_parallel(&sources);
    println!("Built {} routes in {:?}", store.len(), start.elapsed());

    let resolver = PositionResolver::new(
        Arc::new(store),
        Arc::new(ReferenceTable::empty()),
        ResolverConfig::default(),
    );

    let start = Instant::now();
    let queries = 1000;
    let mut hits = 0;
    for q in 0..queries {
        let lat = 4.5 + (q % 500) as f64 * 0.0009;
        let lng = -74.0 + (q % 12) as f64 * 0.05 + 0.0001;
        if let Some(route_id) = resolver.nearest_route(lat, lng) {
            if resolver.distance_along_route(route_id, lat, lng).is_some() {
                hits += 1;
            }
        }
    }
    println!(
        "{} queries ({} resolved) in {:?}",
        queries,
        hits,
        start.elapsed()
    );
}
