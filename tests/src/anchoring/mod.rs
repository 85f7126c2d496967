#[cfg(test)]
mod anchoring_tests {
    use std::{collections::BTreeSet, sync::Arc, time::Duration};

    use assert_matches::assert_matches;
    use futures::future::join_all;
    use node::{CollectionSession, Federation};
    use topology::Topology;
    use types::{NodeId, SessionStatus, SignatureRequest, errors::CollectionError};

    use crate::mocks::{Delivery, FailingAnchor, LINK, RecordingAnchor, seeded};

    fn launch(topology: Topology) -> (Federation, RecordingAnchor) {
        let anchor = RecordingAnchor::default();
        let federation =
            Federation::launch(topology, &seeded("anchoring"), Arc::new(anchor.clone())).unwrap();
        (federation, anchor)
    }

    #[tokio::test(start_paused = true)]
    async fn every_terminal_outcome_is_delivered_once() {
        let (federation, anchor) = launch(Topology::chain(3, LINK).unwrap());
        let deadline = Duration::from_secs(2);

        let verified = SignatureRequest::new(b"a".to_vec(), 3, deadline);
        federation.collect(verified.clone()).await.unwrap();

        let expired = SignatureRequest::new(b"b".to_vec(), 3, Duration::ZERO);
        federation.collect(expired.clone()).await.unwrap();

        let cancelled = SignatureRequest::new(b"c".to_vec(), 3, deadline);
        let session = federation.session(cancelled.clone()).unwrap();
        session.handle().cancel();
        assert_eq!(session.run().await.status, SessionStatus::Cancelled);

        federation.isolate(NodeId(3));
        let partial = SignatureRequest::new(b"d".to_vec(), 3, deadline);
        federation.collect(partial.clone()).await.unwrap();

        let deliveries = anchor.deliveries();
        assert_eq!(deliveries.len(), 4);
        assert_eq!(
            deliveries[0],
            Delivery::Verified {
                request_id: verified.request_id(),
                message: b"a".to_vec(),
                signer_ids: BTreeSet::from([NodeId(1), NodeId(2), NodeId(3)]),
            }
        );
        assert_matches!(
            &deliveries[1],
            Delivery::Failed { request_id, reason: CollectionError::SessionTimeout }
                if *request_id == expired.request_id()
        );
        assert_matches!(
            &deliveries[2],
            Delivery::Failed { request_id, reason: CollectionError::Cancelled }
                if *request_id == cancelled.request_id()
        );
        assert_matches!(
            &deliveries[3],
            Delivery::Failed { request_id, reason: CollectionError::QuorumNotMet { collected: 2, quorum: 3 } }
                if *request_id == partial.request_id()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_duplicate_does_not_touch_the_running_session() {
        let (federation, anchor) = launch(Topology::chain(3, LINK).unwrap());
        let request = SignatureRequest::new(b"m".to_vec(), 3, Duration::from_secs(2));

        let first = tokio::spawn(federation.session(request.clone()).unwrap().run());
        tokio::time::sleep(LINK).await;
        let second = federation.collect(request.clone()).await.unwrap();

        assert_matches!(second.failure, Some(CollectionError::Rejected(_)));
        assert_eq!(first.await.unwrap().status, SessionStatus::Verified);
        assert_matches!(
            anchor.deliveries_for(request.request_id()).as_slice(),
            [Delivery::Verified { .. }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sessions_are_each_anchored_once() {
        let (federation, anchor) = launch(Topology::m_ary(15, 2, LINK).unwrap());
        let requests: Vec<_> = (0..8)
            .map(|i| {
                SignatureRequest::new(format!("response-{i}").into_bytes(), 15, Duration::from_secs(3))
            })
            .collect();
        let sessions = requests
            .iter()
            .map(|request| federation.session(request.clone()).unwrap());

        let reports = join_all(sessions.map(CollectionSession::run)).await;

        assert!(reports.iter().all(|report| report.status == SessionStatus::Verified));
        assert_eq!(anchor.deliveries().len(), requests.len());
        for request in &requests {
            assert_matches!(
                anchor.deliveries_for(request.request_id()).as_slice(),
                [Delivery::Verified { message, .. }] if message.as_slice() == request.message()
            );
        }
        for node in federation.nodes() {
            assert_eq!(node.in_flight_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_anchor_leaves_the_report_intact() {
        let federation = Federation::launch(
            Topology::chain(3, LINK).unwrap(),
            &seeded("anchoring"),
            Arc::new(FailingAnchor),
        )
        .unwrap();

        let report = federation
            .collect(SignatureRequest::new(b"m".to_vec(), 3, Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(report.status, SessionStatus::Verified);
        assert!(report.aggregate.is_some());
    }
}
