use std::path::PathBuf;
use std::time::Duration;

use bitcoin::{BlockHash, Txid};

// ==============================================================================
// RPC Errors
// ==============================================================================

/// Failure of a single daemon RPC invocation, regardless of transport.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("could not run `{program}` for `{method}`: {source}")]
    Spawn {
        program: String,
        method: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{method}` exited with status {exit_status}: {raw_output}")]
    Exit {
        method: String,
        exit_status: i32,
        raw_output: String,
    },

    #[error("`{method}` did not answer within {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("`{method}` returned an unparseable response: {message}; output={raw_output}")]
    InvalidResponse {
        method: String,
        message: String,
        raw_output: String,
    },

    #[error("`{method}` failed with RPC error {code}: {message}")]
    Server {
        method: String,
        code: i64,
        message: String,
    },

    #[error("HTTP transport failure for `{method}`: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RpcError {
    /// The RPC method whose invocation failed.
    pub fn method(&self) -> &str {
        match self {
            Self::Spawn { method, .. }
            | Self::Exit { method, .. }
            | Self::Timeout { method, .. }
            | Self::InvalidResponse { method, .. }
            | Self::Server { method, .. }
            | Self::Transport { method, .. } => method,
        }
    }
}

// ==============================================================================
// Core Errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("bitcoind is not available yet: {0}")]
    DaemonUnavailable(#[source] RpcError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("could not fetch block {hash}: {source}")]
    BlockFetch { hash: BlockHash, source: RpcError },

    #[error("could not fetch transaction {txid}: {source}")]
    TransactionFetch { txid: Txid, source: RpcError },

    #[error("could not read sensor {}: {message}", .path.display())]
    SensorRead { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ==============================================================================
// Failure Policy
// ==============================================================================

/// What a collection cycle does with a failure of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Publish nothing this cycle; every metric keeps its previous value.
    AbortCycle,
    /// Leave the affected metric out of this cycle's batch.
    SkipMetric,
    /// Keep a whole metric group (e.g. latest-block metrics) at its prior values.
    RetainStale,
    /// Count the failed item as zero and carry on.
    ZeroContribution,
    /// Refuse to start.
    Fatal,
}

impl CoreError {
    pub fn policy(&self) -> ErrorPolicy {
        match self {
            Self::DaemonUnavailable(_) => ErrorPolicy::AbortCycle,
            Self::Rpc(_) => ErrorPolicy::SkipMetric,
            Self::BlockFetch { .. } => ErrorPolicy::RetainStale,
            Self::TransactionFetch { .. } | Self::SensorRead { .. } => {
                ErrorPolicy::ZeroContribution
            }
            Self::Config(_) | Self::Metrics(_) | Self::Io(_) => ErrorPolicy::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;

    use super::*;

    fn warming_up() -> RpcError {
        RpcError::Exit {
            method: "getblockchaininfo".to_owned(),
            exit_status: 28,
            raw_output: "error code: -28\nerror message:\nLoading block index...".to_owned(),
        }
    }

    #[test]
    fn policy_table_never_aborts_on_secondary_failures() {
        assert_eq!(
            CoreError::DaemonUnavailable(warming_up()).policy(),
            ErrorPolicy::AbortCycle
        );
        assert_eq!(CoreError::Rpc(warming_up()).policy(), ErrorPolicy::SkipMetric);
        assert_eq!(
            CoreError::BlockFetch {
                hash: BlockHash::all_zeros(),
                source: warming_up(),
            }
            .policy(),
            ErrorPolicy::RetainStale
        );
        assert_eq!(
            CoreError::TransactionFetch {
                txid: Txid::all_zeros(),
                source: warming_up(),
            }
            .policy(),
            ErrorPolicy::ZeroContribution
        );
        assert_eq!(
            CoreError::Config("fast interval must be at least 1s".into()).policy(),
            ErrorPolicy::Fatal
        );
    }

    #[test]
    fn rpc_error_reports_failed_method() {
        assert_eq!(warming_up().method(), "getblockchaininfo");
        let timeout = RpcError::Timeout {
            method: "getblock".to_owned(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(timeout.method(), "getblock");
        assert!(timeout.to_string().contains("30s"));
    }
}
