mod errors;
mod simulate;

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use crypto::KeyPair;
use metrics_exporter_prometheus::PrometheusBuilder;
use node::{FederationConfig, logging::init_logging};
use serde::Serialize;
use topology::TopologySpec;
use tracing::{debug, info};
use types::{NodeId, errors::NodeError};

use crate::{
    errors::CliError,
    simulate::{DEFAULT_MESSAGE, Simulation, Sweep, render_round, render_sweep, simulate, sweep},
};

#[derive(Parser, Debug)]
#[command(name = "collabfed")]
#[command(about = "Simulate topology-aware BLS signature collection across a federation.")]
#[command(version)]
struct Cli {
    /// Serve Prometheus metrics on this address while the command runs
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    /// Also write a daily rolling log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run collection rounds over a simulated federation
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        topology: TopologyArgs,
        #[arg(short, long)]
        quorum: Option<usize>,
        #[arg(long)]
        deadline_ms: Option<u64>,
        #[arg(long)]
        finalize_margin_ms: Option<u64>,
        /// Nodes that neither send nor receive, e.g. `--isolate CM5`
        #[arg(long, num_args = 1..)]
        isolate: Vec<NodeId>,
        #[arg(short, long, default_value_t = 1)]
        rounds: u32,
        #[arg(short, long, default_value = DEFAULT_MESSAGE)]
        message: String,
        /// Derive node keys from this seed for reproducible runs
        #[arg(long)]
        seed: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Measure completion time over a chain for increasing link latencies
    Sweep {
        #[arg(short, long, default_value_t = 32)]
        nodes: u32,
        #[arg(long, value_delimiter = ',', default_values_t = [50, 100, 200, 400])]
        latencies_ms: Vec<u64>,
        /// Defaults to the critical-path round trip plus one second
        #[arg(long)]
        deadline_ms: Option<u64>,
        #[arg(long)]
        seed: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print a fresh public key with its proof of possession
    Keygen {
        #[arg(long)]
        seed: Option<String>,
    },
    /// Write a default federation config file
    InitConfig {
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Shape {
    Chain,
    Tree,
}

/// Overrides for the topology section of the config file.
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
struct TopologyArgs {
    #[arg(long, value_enum)]
    shape: Option<Shape>,
    #[arg(short, long)]
    nodes: Option<u32>,
    #[arg(short, long)]
    branching: Option<u32>,
    #[arg(short, long)]
    latency_ms: Option<u64>,
}

impl TopologyArgs {
    const fn is_empty(&self) -> bool {
        self.shape.is_none()
            && self.nodes.is_none()
            && self.branching.is_none()
            && self.latency_ms.is_none()
    }

    fn apply(&self, current: &TopologySpec) -> Result<TopologySpec, CliError> {
        if self.is_empty() {
            return Ok(current.clone());
        }

        let (shape, nodes, branching, latency_ms) = match current {
            TopologySpec::Chain { nodes, latency_ms } => (Shape::Chain, *nodes, 2, *latency_ms),
            TopologySpec::Tree {
                nodes,
                branching,
                latency_ms,
            } => (Shape::Tree, *nodes, *branching, *latency_ms),
            TopologySpec::Explicit { .. } if self.shape.is_none() => {
                return Err(CliError::Usage(
                    "The configured topology is explicit; pass --shape to replace it".into(),
                ));
            }
            TopologySpec::Explicit { links, .. } => (
                Shape::Chain,
                u32::try_from(links.len() + 1).unwrap_or(u32::MAX),
                2,
                50,
            ),
        };

        let nodes = self.nodes.unwrap_or(nodes);
        let latency_ms = self.latency_ms.unwrap_or(latency_ms);
        let shape = self.shape.unwrap_or(if self.branching.is_some() {
            Shape::Tree
        } else {
            shape
        });

        Ok(match shape {
            Shape::Chain => TopologySpec::Chain { nodes, latency_ms },
            Shape::Tree => TopologySpec::Tree {
                nodes,
                branching: self.branching.unwrap_or(branching),
                latency_ms,
            },
        })
    }
}

#[derive(Debug, Serialize)]
struct KeyReport {
    public_key: String,
    proof_of_possession: String,
}

fn keygen(seed: Option<&str>) -> Result<KeyReport, CliError> {
    let (keypair, proof) = match seed {
        Some(seed) => KeyPair::from_seed(seed.as_bytes())?,
        None => KeyPair::generate()?,
    };
    Ok(KeyReport {
        public_key: hex::encode(keypair.public_key().to_bytes()),
        proof_of_possession: hex::encode(proof.to_bytes()),
    })
}

/// A missing file is only an error when a path was asked for explicitly.
fn load_config(explicit: Option<PathBuf>) -> Result<FederationConfig, CliError> {
    let asked_for = explicit.is_some();
    let path = FederationConfig::resolve_config_path(explicit)?;
    if path.exists() {
        return Ok(FederationConfig::load(&path)?);
    }
    if asked_for {
        return Err(NodeError::Config(format!("Config file {} not found", path.display())).into());
    }
    debug!("No config at {}, using defaults", path.display());
    Ok(FederationConfig::default())
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<PathBuf, CliError> {
    let path = match output {
        Some(path) if path.is_dir() => path.join("config.yaml"),
        Some(path) => path,
        None => FederationConfig::default_config_path()?,
    };
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        )));
    }
    FederationConfig::default().save(&path)?;
    Ok(path)
}

fn install_metrics_exporter(addr: SocketAddr) -> Result<(), CliError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    info!("Serving metrics on http://{addr}/metrics");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Simulate { config, .. } => Some(load_config(config.clone())?),
        _ => None,
    };
    let log_dir = cli.log_dir.clone().or_else(|| {
        config
            .as_ref()
            .and_then(|config| config.log_file_path.clone())
    });
    init_logging(log_dir.as_deref())?;
    if let Some(addr) = cli.metrics_addr {
        install_metrics_exporter(addr)?;
    }

    match cli.command {
        Commands::Simulate {
            topology,
            quorum,
            deadline_ms,
            finalize_margin_ms,
            isolate,
            rounds,
            message,
            seed,
            json,
            ..
        } => {
            let mut config = config.unwrap_or_default();
            config.topology = topology.apply(&config.topology)?;
            config.quorum = quorum.or(config.quorum);
            config.deadline_ms = deadline_ms.unwrap_or(config.deadline_ms);
            config.finalize_margin_ms = finalize_margin_ms.unwrap_or(config.finalize_margin_ms);
            config.key_seed = seed.or(config.key_seed);

            let summaries = simulate(&Simulation {
                config,
                isolate,
                rounds,
                message,
            })
            .await?;
            if json {
                print_json(&summaries)?;
            } else {
                for summary in &summaries {
                    println!("{}", render_round(summary));
                }
            }
        }
        Commands::Sweep {
            nodes,
            latencies_ms,
            deadline_ms,
            seed,
            json,
        } => {
            let points = sweep(&Sweep {
                nodes,
                latencies_ms,
                deadline_ms,
                key_seed: seed,
            })
            .await?;
            if json {
                print_json(&points)?;
            } else {
                println!("{}", render_sweep(&points));
            }
        }
        Commands::Keygen { seed } => print_json(&keygen(seed.as_deref())?)?,
        Commands::InitConfig { output, force } => {
            let path = init_config(output, force)?;
            println!("Default config written to {}", path.display());
        }
    }
    Ok(())
}
