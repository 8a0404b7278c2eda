//! Response shapes for the bitcoind RPC methods the exporter calls.
//!
//! Only the fields the exporter reads are modelled; serde ignores the
//! rest, so newer daemon versions that add fields keep working.

use bitcoin::{BlockHash, Txid};
use serde::de::IgnoredAny;
use serde::Deserialize;

// ==============================================================================
// Blockchain Info
// ==============================================================================

/// Result of `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    #[serde(rename = "initialblockdownload")]
    pub initial_block_download: bool,
    #[serde(rename = "verificationprogress", default)]
    pub verification_progress: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(rename = "bestblockhash", default)]
    pub best_block_hash: Option<BlockHash>,
}

// ==============================================================================
// Network Info
// ==============================================================================

/// Result of `getnetworkinfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInfo {
    pub connections: u64,
    #[serde(default)]
    pub warnings: Warnings,
}

/// Daemon warnings: a single string up to v27, a list of strings since v28.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Warnings {
    Text(String),
    List(Vec<String>),
}

impl Default for Warnings {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Warnings {
    pub fn is_present(&self) -> bool {
        match self {
            Self::Text(text) => !text.trim().is_empty(),
            Self::List(items) => items.iter().any(|w| !w.trim().is_empty()),
        }
    }
}

// ==============================================================================
// Mempool, Net Totals
// ==============================================================================

/// Result of `getmempoolinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MempoolInfo {
    /// Number of transactions.
    pub size: u64,
    /// Serialized size of all transactions.
    pub bytes: u64,
}

/// Result of `getnettotals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NetTotals {
    #[serde(rename = "totalbytesrecv")]
    pub total_bytes_recv: u64,
    #[serde(rename = "totalbytessent")]
    pub total_bytes_sent: u64,
}

// ==============================================================================
// Blocks and Transactions
// ==============================================================================

/// Result of `getblock <hash>` at the default verbosity (txids only).
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub size: u64,
    pub tx: Vec<Txid>,
}

/// Result of `getrawtransaction <txid> 1`, reduced to input/output counts.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    vin: Vec<IgnoredAny>,
    vout: Vec<IgnoredAny>,
}

impl RawTransaction {
    pub fn input_count(&self) -> u64 {
        self.vin.len() as u64
    }

    pub fn output_count(&self) -> u64 {
        self.vout.len() as u64
    }
}
