pub mod block;
pub mod error;
pub mod host;
pub mod metrics;
pub mod poll;
pub mod rpc;
pub mod types;

pub use error::{CoreError, ErrorPolicy, RpcError};
pub use metrics::MetricRegistry;
pub use poll::{PollConfig, PollPhase, PollState, Poller};
pub use types::{BlockSummary, Chain, DaemonStatus};
