//! Fetch the configured network over HTTP and locate one coordinate.
//!
//! Run with: cargo run --example http_load --features http -- <base-url> <lat> <lng>

use route_locator::{fetch_locator, SourceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://localhost:8000".to_string());
    let lat: f64 = args.next().map_or(Ok(4.7110), |s| s.parse())?;
    let lng: f64 = args.next().map_or(Ok(-74.0721), |s| s.parse())?;

    let config = SourceConfig::default();
    println!("Fetching {} routes + {} from {}", config.routes.len(), config.reference_table, base_url);

    let locator = fetch_locator(&base_url, &config).await?;
    locator.wait_ready().await;

    if let Some(resolver) = locator.resolver() {
        for route in resolver.routes().iter() {
            println!(
                "  {}: {} points, {:.0} m",
                route.route_id(),
                route.points().len(),
                route.total_length_meters()
            );
        }
        println!("  {} reference posts", resolver.reference_table().len());
    }

    let position = locator.locate(lat, lng);
    println!("({:.6}, {:.6}) -> {}", lat, lng, position);
    Ok(())
}
