use std::{fmt::Write as _, sync::Arc, time::Duration};

use node::{EndorsementLedger, Federation, FederationConfig};
use serde::Serialize;
use topology::{Topology, TopologySpec};
use tracing::info;
use types::{NodeId, SessionReport, SessionStatus, SignatureRequest, errors::NodeError};

use crate::errors::CliError;

pub const DEFAULT_MESSAGE: &str = "resource-response";

/// Added on top of the round trip over the critical path when a sweep
/// derives its own deadline.
const SWEEP_DEADLINE_HEADROOM: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Simulation {
    pub config: FederationConfig,
    pub isolate: Vec<NodeId>,
    pub rounds: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub request_id: String,
    pub status: SessionStatus,
    pub quorum: usize,
    pub signers: Vec<NodeId>,
    pub signer_bitmap: String,
    pub missing: Vec<NodeId>,
    pub subtree_timeouts: Vec<NodeId>,
    pub failure: Option<String>,
    pub aggregate_signature: Option<String>,
    pub elapsed_ms: u64,
}

impl RoundSummary {
    fn new(round: u32, quorum: usize, report: &SessionReport, topology: &Topology) -> Self {
        Self {
            round,
            request_id: report.request_id.to_string(),
            status: report.status,
            quorum,
            signers: report.signer_ids.iter().copied().collect(),
            signer_bitmap: hex::encode(topology.signer_bitmap(&report.signer_ids)),
            missing: report.missing.iter().copied().collect(),
            subtree_timeouts: report.subtree_timeouts.clone(),
            failure: report.failure.as_ref().map(ToString::to_string),
            aggregate_signature: report
                .aggregate
                .as_ref()
                .map(|aggregate| hex::encode(aggregate.signature().to_bytes())),
            elapsed_ms: millis(report.elapsed),
        }
    }
}

/// Launches a federation for `simulation.config`, runs the requested rounds
/// one after another, then shuts every node down.
pub async fn simulate(simulation: &Simulation) -> Result<Vec<RoundSummary>, CliError> {
    let topology = simulation.config.topology.build()?;
    if let Some(unknown) = simulation.isolate.iter().find(|id| !topology.contains(*id)) {
        return Err(NodeError::UnknownNode(*unknown).into());
    }

    let ledger = EndorsementLedger::new(Arc::new(topology.clone()));
    let federation = Federation::launch(topology, &simulation.config, Arc::new(ledger))?;
    for node_id in &simulation.isolate {
        federation.isolate(*node_id);
    }

    let quorum = federation.default_quorum();
    let mut summaries = Vec::with_capacity(simulation.rounds as usize);
    let mut outcome = Ok(());
    for round in 1..=simulation.rounds {
        let request = SignatureRequest::new(
            simulation.message.as_bytes().to_vec(),
            quorum,
            simulation.config.deadline(),
        );
        match federation.collect(request).await {
            Ok(report) => {
                info!("Round {round} finished with {}", report.status);
                summaries.push(RoundSummary::new(round, quorum, &report, federation.topology()));
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    federation.shutdown().await;
    outcome?;
    Ok(summaries)
}

#[derive(Debug, Clone)]
pub struct Sweep {
    pub nodes: u32,
    pub latencies_ms: Vec<u64>,
    pub deadline_ms: Option<u64>,
    pub key_seed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepPoint {
    pub latency_ms: u64,
    pub nodes: usize,
    pub depth: usize,
    pub status: SessionStatus,
    pub signers: usize,
    pub round_trip_ms: u64,
    pub elapsed_ms: u64,
}

/// One fully responsive round per link latency over a chain of
/// `sweep.nodes`.
pub async fn sweep(sweep: &Sweep) -> Result<Vec<SweepPoint>, CliError> {
    let mut points = Vec::with_capacity(sweep.latencies_ms.len());
    for &latency_ms in &sweep.latencies_ms {
        let spec = TopologySpec::Chain {
            nodes: sweep.nodes,
            latency_ms,
        };
        let topology = spec.build()?;
        let round_trip = topology.critical_path_latency() * 2;
        let deadline_ms = sweep
            .deadline_ms
            .unwrap_or_else(|| millis(round_trip + SWEEP_DEADLINE_HEADROOM));

        let config = FederationConfig {
            topology: spec,
            deadline_ms,
            key_seed: sweep.key_seed.clone(),
            ..FederationConfig::default()
        };
        let simulation = Simulation {
            config,
            isolate: Vec::new(),
            rounds: 1,
            message: DEFAULT_MESSAGE.into(),
        };
        let summaries = simulate(&simulation).await?;
        let Some(summary) = summaries.first() else {
            continue;
        };

        points.push(SweepPoint {
            latency_ms,
            nodes: topology.len(),
            depth: topology.depth(),
            status: summary.status,
            signers: summary.signers.len(),
            round_trip_ms: millis(round_trip),
            elapsed_ms: summary.elapsed_ms,
        });
    }
    Ok(points)
}

pub fn render_round(summary: &RoundSummary) -> String {
    let mut out = format!(
        "round {} {}: {}/{} signers in {}ms (request {})",
        summary.round,
        summary.status,
        summary.signers.len(),
        summary.quorum,
        summary.elapsed_ms,
        summary.request_id
    );
    if let Some(aggregate) = &summary.aggregate_signature {
        let _ = write!(out, "\n  aggregate: {aggregate}");
        let _ = write!(out, "\n  signer bitmap: {}", summary.signer_bitmap);
    }
    if !summary.missing.is_empty() {
        let _ = write!(out, "\n  missing: {}", join(&summary.missing));
    }
    if !summary.subtree_timeouts.is_empty() {
        let _ = write!(
            out,
            "\n  subtree timeouts: {}",
            join(&summary.subtree_timeouts)
        );
    }
    if let Some(failure) = &summary.failure {
        let _ = write!(out, "\n  failure: {failure}");
    }
    out
}

pub fn render_sweep(points: &[SweepPoint]) -> String {
    let mut out = format!(
        "{:>10} {:>6} {:>6} {:>22} {:>8} {:>14} {:>11}",
        "latency_ms", "nodes", "depth", "status", "signers", "round_trip_ms", "elapsed_ms"
    );
    for point in points {
        let _ = write!(
            out,
            "\n{:>10} {:>6} {:>6} {:>22} {:>8} {:>14} {:>11}",
            point.latency_ms,
            point.nodes,
            point.depth,
            point.status.to_string(),
            point.signers,
            point.round_trip_ms,
            point.elapsed_ms
        );
    }
    out
}

fn join(ids: &[NodeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
