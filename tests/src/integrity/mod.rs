#[cfg(test)]
mod integrity_tests {
    use std::{collections::BTreeSet, sync::Arc, time::Duration};

    use crypto::KeyPair;
    use topology::Topology;
    use types::{
        AggregateSignature, NodeId, SessionStatus, SignatureRequest, errors::CollectionError,
    };

    use crate::mocks::{Delivery, LINK, RecordingAnchor, Tamper, launch_tampered, seeded};

    const SEED: &str = "integrity";
    const MESSAGE: &[u8] = b"resource-response";

    fn request(quorum: usize) -> SignatureRequest {
        SignatureRequest::new(MESSAGE.to_vec(), quorum, Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_signature_in_a_subtree_fails_integrity() {
        let anchor = RecordingAnchor::default();
        let (federation, network) = launch_tampered(
            Topology::chain(5, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(anchor.clone()),
        );
        let (impostor, _) = KeyPair::from_seed(b"impostor").unwrap();
        network.tamper(NodeId(3), Tamper::ReplaceSignature(impostor.sign(MESSAGE)));
        let request = request(5);

        let report = federation.collect(request.clone()).await.unwrap();

        assert_eq!(report.status, SessionStatus::IntegrityFailed);
        assert_eq!(
            report.failure,
            Some(CollectionError::AggregateVerificationFailure)
        );
        assert!(report.aggregate.is_none());
        assert_eq!(report.signer_ids.len(), 5);
        assert_eq!(
            anchor.deliveries_for(request.request_id()),
            vec![Delivery::Failed {
                request_id: request.request_id(),
                reason: CollectionError::AggregateVerificationFailure,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_signature_over_another_message_fails_integrity() {
        let (federation, network) = launch_tampered(
            Topology::m_ary(7, 2, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(RecordingAnchor::default()),
        );
        // Same derivation the federation uses, so the key itself is genuine.
        let (genuine, _) = KeyPair::from_seed(format!("{SEED}/{}", NodeId(6)).as_bytes()).unwrap();
        network.tamper(NodeId(6), Tamper::ReplaceSignature(genuine.sign(b"yesterday")));

        let report = federation.collect(request(7)).await.unwrap();

        assert_eq!(report.status, SessionStatus::IntegrityFailed);
        assert!(report.aggregate.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn inflated_coverage_is_caught_at_the_root() {
        let (federation, network) = launch_tampered(
            Topology::chain(5, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(RecordingAnchor::default()),
        );
        federation.isolate(NodeId(5));
        network.tamper(NodeId(3), Tamper::ClaimSigner(NodeId(5)));

        let report = federation.collect(request(5)).await.unwrap();

        assert_eq!(report.status, SessionStatus::IntegrityFailed);
        assert_eq!(report.signer_ids.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn coverage_outside_the_senders_subtree_drops_the_subtree() {
        let (federation, network) = launch_tampered(
            Topology::chain(5, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(RecordingAnchor::default()),
        );
        network.tamper(NodeId(3), Tamper::ClaimSigner(NodeId(1)));

        let report = federation.collect(request(5)).await.unwrap();

        assert_eq!(report.status, SessionStatus::PartialQuorumFailed);
        assert_eq!(report.signer_ids, BTreeSet::from([NodeId(1), NodeId(2)]));
        assert_eq!(
            report.missing,
            BTreeSet::from([NodeId(3), NodeId(4), NodeId(5)])
        );
        assert_eq!(report.subtree_timeouts, vec![NodeId(3)]);
        // The forged contribution is discarded on arrival, nobody waits for
        // the deadline.
        assert!(report.elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn swallowed_contribution_costs_the_whole_subtree() {
        let (federation, network) = launch_tampered(
            Topology::chain(5, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(RecordingAnchor::default()),
        );
        network.tamper(NodeId(4), Tamper::Drop);

        let report = federation.collect(request(3)).await.unwrap();

        assert_eq!(report.status, SessionStatus::Verified);
        assert_eq!(
            report.signer_ids,
            BTreeSet::from([NodeId(1), NodeId(2), NodeId(3)])
        );
        assert_eq!(report.subtree_timeouts, vec![NodeId(4)]);
        assert!(
            report
                .aggregate
                .unwrap()
                .verify(MESSAGE, &federation.registry())
        );
        assert_eq!(network.sent("collection_request"), 4);
        assert_eq!(network.sent("contribution"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn flipped_byte_in_an_encoded_aggregate_never_verifies() {
        let (federation, _) = launch_tampered(
            Topology::chain(5, LINK).unwrap(),
            &seeded(SEED),
            Arc::new(RecordingAnchor::default()),
        );
        let report = federation.collect(request(5)).await.unwrap();
        let registry = federation.registry();
        let encoded = report.aggregate.unwrap().encode().unwrap();
        assert!(
            AggregateSignature::decode(&encoded)
                .unwrap()
                .verify(MESSAGE, &registry)
        );

        for position in 0..encoded.len() {
            let mut corrupted = encoded.clone();
            corrupted[position] ^= 0x01;
            if let Ok(aggregate) = AggregateSignature::decode(&corrupted) {
                assert!(
                    !aggregate.verify(MESSAGE, &registry),
                    "byte {position} flipped and still verified"
                );
            }
        }
    }
}
