pub mod fixture;
pub mod simulated;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::engine::job::JobSource;
use crate::engine::source::AdapterRegistry;

pub use fixture::FixtureAdapter;
pub use simulated::SimulatedAdapter;

/// Registers a simulated adapter for each of `simulated`, then a fixture
/// adapter for every source with a file in `fixtures_dir`. Fixtures win.
pub fn build_registry(fixtures_dir: Option<&Path>, simulated: &[JobSource]) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    for source in simulated {
        registry.register(Arc::new(SimulatedAdapter::new(*source)));
        info!("Registered simulated adapter for {}", source);
    }

    if let Some(dir) = fixtures_dir {
        for source in JobSource::ALL {
            let adapter = FixtureAdapter::new(source, dir);
            if adapter.path().is_file() {
                info!("Registered fixture adapter for {} ({})", source, adapter.path().display());
                registry.register(Arc::new(adapter));
            }
        }
    }

    registry
}
