#[cfg(test)]
mod timing_tests {
    use std::{collections::BTreeSet, sync::Arc, time::Duration};

    use node::{EndorsementLedger, Federation, collection::HOP_MARGIN};
    use topology::{Topology, TopologyBuilder};
    use types::{NodeId, SessionStatus, SignatureRequest};

    use crate::mocks::{LINK, assert_close, seeded};

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// CM1 -> CM2 (10ms) -> CM3 (200ms), CM1 -> CM4 (50ms)
    fn lopsided() -> Topology {
        TopologyBuilder::new(NodeId(1))
            .link(NodeId(1), NodeId(2), ms(10))
            .link(NodeId(2), NodeId(3), ms(200))
            .link(NodeId(1), NodeId(4), ms(50))
            .build()
            .unwrap()
    }

    fn launch(topology: Topology) -> Federation {
        let ledger = EndorsementLedger::new(Arc::new(topology.clone()));
        Federation::launch(topology, &seeded("timing"), Arc::new(ledger)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn slowest_path_sets_the_pace() {
        let federation = launch(lopsided());

        let report = federation
            .collect(SignatureRequest::new(b"m".to_vec(), 4, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(report.status, SessionStatus::Verified);
        assert_close(report.elapsed, ms(210) * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tight_deadline_trims_the_slow_branch() {
        let federation = launch(lopsided());

        // Root answers by 300ms; CM3's reply cannot reach CM2 before CM2
        // has to answer at 288ms.
        let report = federation
            .collect(SignatureRequest::new(b"m".to_vec(), 3, ms(400)))
            .await
            .unwrap();

        assert_eq!(report.status, SessionStatus::Verified);
        assert_eq!(
            report.signer_ids,
            BTreeSet::from([NodeId(1), NodeId(2), NodeId(4)])
        );
        assert_eq!(report.subtree_timeouts, vec![NodeId(3)]);
        assert_close(report.elapsed, ms(300) - HOP_MARGIN);
    }

    #[tokio::test(start_paused = true)]
    async fn bushy_tree_outpaces_a_chain_of_the_same_size() {
        let mut elapsed = Vec::new();
        for topology in [
            Topology::m_ary(63, 2, LINK).unwrap(),
            Topology::chain(63, LINK).unwrap(),
        ] {
            let depth = u32::try_from(topology.depth()).unwrap();
            let federation = launch(topology);
            let report = federation
                .collect(SignatureRequest::new(b"m".to_vec(), 63, Duration::from_secs(10)))
                .await
                .unwrap();

            assert_eq!(report.status, SessionStatus::Verified);
            assert_close(report.elapsed, LINK * 2 * depth);
            elapsed.push(report.elapsed);
            federation.shutdown().await;
        }
        assert!(elapsed[0] * 10 < elapsed[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnected_node_rejoins_the_next_round() {
        let federation = launch(Topology::chain(4, LINK).unwrap());
        let request = || SignatureRequest::new(b"m".to_vec(), 4, Duration::from_secs(2));

        federation.isolate(NodeId(4));
        let first = federation.collect(request()).await.unwrap();
        federation.reconnect(NodeId(4));
        let second = federation.collect(request()).await.unwrap();

        assert_eq!(first.status, SessionStatus::PartialQuorumFailed);
        assert_eq!(first.missing, BTreeSet::from([NodeId(4)]));
        assert_eq!(second.status, SessionStatus::Verified);
        assert_close(second.elapsed, LINK * 6);
    }
}
