//! Filesystem loading of configured sources.
//!
//! Each route loads on its own: a missing or unreadable file drops that route
//! with a warning and the rest of the network still loads. A reference table
//! that cannot be read or lacks its columns is installed as an empty table,
//! so resolution reports `?` instead of never becoming ready.

use std::path::Path;

use log::{error, info, warn};

use crate::config::{RouteSource, SourceConfig};
use crate::error::Result;
use crate::geometry::{Route, RouteStore};
use crate::locator::Locator;
use crate::reference_table::{ReferenceTable, ReferenceTableConfig};

fn load_route(dir: &Path, source: &RouteSource) -> Result<Route> {
    let text = std::fs::read_to_string(dir.join(&source.location))?;
    Route::from_source(&source.route_id, &text)
}

fn load_route_logged(dir: &Path, source: &RouteSource) -> Option<Route> {
    match load_route(dir, source) {
        Ok(route) => Some(route),
        Err(e) => {
            warn!("Route {} ({}) not loaded: {}", source.route_id, source.location, e);
            None
        }
    }
}

/// Load every configured route found under `dir`, keeping configuration order.
pub fn load_route_store(dir: &Path, sources: &[RouteSource]) -> RouteStore {
    #[cfg(feature = "parallel")]
    let routes: Vec<Option<Route>> = {
        use rayon::prelude::*;
        sources
            .par_iter()
            .map(|source| load_route_logged(dir, source))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let routes: Vec<Option<Route>> = sources
        .iter()
        .map(|source| load_route_logged(dir, source))
        .collect();

    let store: RouteStore = routes.into_iter().flatten().collect();
    info!(
        "Loaded {}/{} routes from {}: {:?}",
        store.len(),
        sources.len(),
        dir.display(),
        store.route_ids()
    );
    store
}

/// Load the reference table, falling back to an empty table on any failure.
pub fn load_reference_table(path: &Path, config: &ReferenceTableConfig) -> ReferenceTable {
    ReferenceTable::from_path(path, config).unwrap_or_else(|e| {
        error!("Reference table {} not loaded: {}", path.display(), e);
        ReferenceTable::empty()
    })
}

/// Build a ready [`Locator`] from files under `dir`.
///
/// Route geometries and the reference table are loaded on separate threads.
pub fn load_locator(dir: &Path, config: &SourceConfig) -> Locator {
    let locator = Locator::new(config.resolver.clone());

    std::thread::scope(|scope| {
        scope.spawn(|| {
            locator.install_reference_table(load_reference_table(
                &dir.join(&config.reference_table),
                &config.table,
            ));
        });
        locator.install_routes(load_route_store(dir, &config.routes));
    });

    locator
}
