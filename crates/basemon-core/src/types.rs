//! Domain types shared by the poll loop, the block inspector and the
//! metric registry.
//!
//! A [`DaemonStatus`] is one poll cycle's view of bitcoind; a
//! [`BlockSummary`] describes the best block seen in that cycle. Both are
//! rebuilt from scratch every cycle and never persisted.

use bitcoin::BlockHash;

use crate::rpc::types::{MempoolInfo, NetTotals};

// ==============================================================================
// Chain
// ==============================================================================

/// The chain a daemon reports in `getblockchaininfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    Main,
    Test,
    Regtest,
    Unknown,
}

impl Chain {
    /// Map a chain name to its variant. Names other than `main`, `test`
    /// and `regtest` (signet, testnet4, typos) are `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "main" => Self::Main,
            "test" => Self::Test,
            "regtest" => Self::Regtest,
            _ => Self::Unknown,
        }
    }

    /// Numeric code exported as `bitcoin_network`.
    pub fn code(self) -> i64 {
        match self {
            Self::Main => 1,
            Self::Test => 2,
            Self::Regtest => 3,
            Self::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Test => write!(f, "test"),
            Self::Regtest => write!(f, "regtest"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ==============================================================================
// Daemon Status
// ==============================================================================

/// Snapshot of daemon state gathered during one poll cycle.
///
/// The first group of fields comes from `getblockchaininfo` and is always
/// present: a cycle whose status call fails never produces a
/// `DaemonStatus`. Every `Option` field comes from a secondary RPC call;
/// `None` means that call failed this cycle and the matching metric keeps
/// its previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonStatus {
    pub chain: Chain,
    pub initial_block_download: bool,
    pub blocks: u64,
    pub headers: u64,
    pub verification_progress: Option<f64>,
    pub difficulty: Option<f64>,
    pub best_block_hash: Option<BlockHash>,

    pub peers: Option<u64>,
    pub warning: Option<bool>,
    pub hash_rate: Option<f64>,
    pub uptime: Option<u64>,
    pub chain_tips: Option<u64>,
    pub mempool: Option<MempoolInfo>,
    pub net_totals: Option<NetTotals>,
}

impl DaemonStatus {
    /// `bitcoin_ibd` value: 1 while in initial block download, else 0.
    pub fn ibd_code(&self) -> i64 {
        i64::from(self.initial_block_download)
    }
}

// ==============================================================================
// Block Summary
// ==============================================================================

/// Aggregates derived from the latest block.
///
/// `inputs` and `outputs` stay at zero unless detailed accounting is
/// enabled (it needs bitcoind to run with `txindex=1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub size: u64,
    pub tx_count: u64,
    pub inputs: u64,
    pub outputs: u64,
    /// Transactions whose decoded form could not be fetched.
    pub skipped_transactions: u64,
}
