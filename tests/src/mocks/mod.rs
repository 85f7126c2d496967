pub mod anchor;
pub mod network;

use std::{sync::Arc, time::Duration};

use node::{Federation, FederationConfig, ResultAnchor};
use topology::Topology;
pub use anchor::{Delivery, FailingAnchor, RecordingAnchor};
pub use network::{Tamper, TamperingNetwork};

pub const LINK: Duration = Duration::from_millis(50);

#[must_use]
pub fn seeded(seed: &str) -> FederationConfig {
    FederationConfig {
        key_seed: Some(seed.to_string()),
        ..FederationConfig::default()
    }
}

/// A federation whose nodes all send through one shared
/// [`TamperingNetwork`].
pub fn launch_tampered(
    topology: Topology,
    config: &FederationConfig,
    anchor: Arc<dyn ResultAnchor>,
) -> (Federation<TamperingNetwork>, TamperingNetwork) {
    let federation =
        Federation::launch_with_network(topology, config, anchor, TamperingNetwork::new)
            .expect("federation launches");
    let network = federation
        .node(&federation.topology().root())
        .expect("root is running")
        .network_handle
        .clone();
    (federation, network)
}

pub fn assert_close(actual: Duration, expected: Duration) {
    let tolerance = Duration::from_millis(5);
    assert!(
        actual.abs_diff(expected) <= tolerance,
        "expected about {expected:?}, got {actual:?}"
    );
}
