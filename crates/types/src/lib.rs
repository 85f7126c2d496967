pub mod contribution;
pub mod errors;
pub mod ids;
pub mod network;
pub mod network_event;
pub mod request;
pub mod session;

#[macro_use]
pub mod macros;

#[doc(hidden)]
pub use metrics;

pub use contribution::{AggregateSignature, PartialContribution};
pub use ids::{NodeId, RequestId};
pub use request::SignatureRequest;
pub use session::{SessionReport, SessionStatus};
