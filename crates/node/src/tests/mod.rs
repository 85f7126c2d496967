use std::{sync::Arc, time::Duration};

use topology::Topology;

use crate::{EndorsementLedger, Federation, FederationConfig};


pub const L: Duration = Duration::from_millis(50);

pub fn launch(topology: Topology, config: &FederationConfig) -> (Federation, EndorsementLedger) {
    let ledger = EndorsementLedger::new(Arc::new(topology.clone()));
    let federation = Federation::launch(topology, config, Arc::new(ledger.clone())).unwrap();
    (federation, ledger)
}

pub fn seeded() -> FederationConfig {
    FederationConfig {
        key_seed: Some("node-tests".into()),
        ..FederationConfig::default()
    }
}

#[track_caller]
pub fn assert_close(actual: Duration, expected: Duration) {
    let tolerance = Duration::from_millis(5);
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected about {expected:?}, got {actual:?}"
    );
}
