#[macro_export]
macro_rules! session_outcome_metrics {
    ($status:expr, $elapsed:expr) => {{
        $crate::metrics::counter!("collection_sessions_total", "status" => $status.to_string()).increment(1);
        $crate::metrics::histogram!("collection_session_duration_seconds", "status" => $status.to_string())
            .record($elapsed.as_secs_f64());
    }};
}

#[macro_export]
macro_rules! coverage_metrics {
    ($covered:expr, $total:expr) => {{
        #[allow(clippy::cast_precision_loss)]
        let ratio = if $total == 0 {
            0.0
        } else {
            $covered as f64 / $total as f64
        };
        $crate::metrics::gauge!("collection_coverage_ratio").set(ratio);
    }};
}

#[macro_export]
macro_rules! contribution_metrics {
    ($node_id:expr, $outcome:expr) => {{
        $crate::metrics::counter!(
            "contributions_total",
            "node_id" => $node_id.to_string(),
            "outcome" => $outcome.to_string()
        )
        .increment(1);
    }};
}

#[macro_export]
macro_rules! direct_message_metrics {
    ($message_type:expr) => {{
        $crate::metrics::counter!("direct_messages_sent", "type" => $message_type.to_string()).increment(1);
    }};
}
