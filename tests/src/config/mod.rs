#[cfg(test)]
mod config_tests {
    use std::{fs, sync::Arc};

    use assert_matches::assert_matches;
    use node::{EndorsementLedger, Federation, FederationConfig};
    use topology::TopologyError;
    use types::{NodeId, SessionStatus, SignatureRequest};

    use crate::mocks::assert_close;

    const EXPLICIT: &str = r"
topology:
  shape: explicit
  root: 1
  links:
    - { parent: 1, child: 2, latency_ms: 20 }
    - { parent: 1, child: 3, latency_ms: 40 }
    - { parent: 3, child: 4, latency_ms: 40 }
quorum: 4
deadline_ms: 2000
key_seed: config-tests
";

    #[tokio::test(start_paused = true)]
    async fn federation_runs_from_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("federation.yaml");
        fs::write(&path, EXPLICIT).unwrap();

        let config = FederationConfig::load(&path).unwrap();
        let topology = config.topology.build().unwrap();
        assert_eq!(topology.depth(), 2);
        let ledger = EndorsementLedger::new(Arc::new(topology.clone()));
        let federation = Federation::launch(topology, &config, Arc::new(ledger.clone())).unwrap();

        let request = SignatureRequest::new(
            b"resource-response".to_vec(),
            federation.default_quorum(),
            config.deadline(),
        );
        let report = federation.collect(request.clone()).await.unwrap();

        assert_eq!(report.status, SessionStatus::Verified);
        assert_close(report.elapsed, std::time::Duration::from_millis(160));
        let endorsement = ledger.endorsement(&request.request_id()).unwrap();
        assert_eq!(endorsement.count, 4);
        assert_eq!(
            endorsement.signers,
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
        );
    }

    #[test]
    fn second_parent_in_a_config_is_refused() {
        let yaml = EXPLICIT.replace("parent: 3, child: 4", "parent: 2, child: 3");
        let config: FederationConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_matches!(
            config.topology.build(),
            Err(TopologyError::MultipleParents(NodeId(3)))
        );
    }
}
