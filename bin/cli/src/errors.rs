use crypto::CryptoError;
use derive_more::Display;
use topology::TopologyError;
use types::errors::{CollectionError, NodeError};

#[derive(Debug, Display)]
pub enum CliError {
    #[display("Node error: {_0}")]
    Node(NodeError),

    #[display("Topology error: {_0}")]
    Topology(TopologyError),

    #[display("Collection error: {_0}")]
    Collection(CollectionError),

    #[display("Crypto error: {_0}")]
    Crypto(CryptoError),

    #[display("Failed to start metrics exporter: {_0}")]
    Metrics(String),

    #[display("Failed to render output: {_0}")]
    Output(String),

    #[display("{_0}")]
    Usage(String),
}

impl std::error::Error for CliError {}

impl From<NodeError> for CliError {
    fn from(error: NodeError) -> Self {
        Self::Node(error)
    }
}

impl From<TopologyError> for CliError {
    fn from(error: TopologyError) -> Self {
        Self::Topology(error)
    }
}

impl From<CollectionError> for CliError {
    fn from(error: CollectionError) -> Self {
        Self::Collection(error)
    }
}

impl From<CryptoError> for CliError {
    fn from(error: CryptoError) -> Self {
        Self::Crypto(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Output(error.to_string())
    }
}
