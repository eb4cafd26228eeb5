//! Walk an observer along a route and print the kilometer-post reference at
//! each step.
//!
//! Run with: cargo run --example locate_walk

use route_locator::{Locator, ReferenceTable, ReferenceTableConfig, ResolverConfig, RouteStore};

fn main() {
    // Two segments north of Bogotá, one vertex every ~55 m
    let north: Vec<String> = (0..=40)
        .map(|i| format!("-74.0500,{:.5}", 4.8000 + i as f64 * 0.0005))
        .collect();
    let east: Vec<String> = (0..=40)
        .map(|i| format!("{:.5},4.9000", -74.0500 + i as f64 * 0.0005))
        .collect();
    let north = north.join(" ");
    let east = east.join(" ");

    let routes = RouteStore::from_sources([("4503", north.as_str()), ("4505", east.as_str())]);

    let csv = "TRAMO,PR,DISTANCIA\n\
               4503,PR0,0\n\
               4503,PR1,\"1000,0\"\n\
               4503,PR2,2000\n\
               4505,PR10,0\n\
               4505,PR11,1000\n";
    let posts = match ReferenceTable::from_csv_str(csv, &ReferenceTableConfig::default()) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Reference table rejected: {}", e);
            ReferenceTable::empty()
        }
    };

    let locator = Locator::new(ResolverConfig::default());
    println!("Before loading: {}", locator.locate(4.8, -74.05));

    locator.install_routes(routes);
    locator.install_reference_table(posts);

    println!("Route Locator Walk\n");
    for step in 0..=10 {
        // A little east of the 4503 axis, as GPS jitter would put us
        let lat = 4.8000 + step as f64 * 0.0019;
        let lng = -74.0501;
        let position = locator.locate(lat, lng);
        println!(
            "  ({:.5}, {:.5}) -> {:<28} distance={}",
            lat,
            lng,
            position.to_string(),
            position
                .distance_meters
                .map_or("-".to_string(), |d| format!("{:.0}m", d))
        );
    }

    println!("\nOn the east segment:");
    let position = locator.locate(4.9001, -74.0400);
    println!("  {}", position);
}
