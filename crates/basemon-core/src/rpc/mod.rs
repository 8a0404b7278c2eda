//! bitcoind RPC abstraction layer.
//!
//! Defines the [`RpcTransport`] trait, the typed [`RpcClient`] built on top
//! of it, and two transports: [`CliTransport`] (runs `bitcoin-cli`) and
//! [`HttpTransport`] (JSON-RPC over HTTP). Tests use `mock::MockTransport`.

mod cli;
mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use cli::{find_in_path, CliTransport};
pub use http_adapter::HttpTransport;

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use crate::error::RpcError;
use types::{Block, BlockchainInfo, MempoolInfo, NetTotals, NetworkInfo, RawTransaction};

/// Carries one RPC invocation to the daemon and hands back its raw output.
///
/// Output follows `bitcoin-cli` conventions: structured results as JSON
/// text, string results unquoted. Implementations must not retry.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: &[serde_json::Value]) -> Result<String, RpcError>;
}

// ==============================================================================
// RPC Client
// ==============================================================================

/// Stateless, cheaply cloneable client over any [`RpcTransport`].
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    /// Invoke `method` and decode its JSON output into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<T, RpcError> {
        let raw = self.transport.call(method, params).await?;
        serde_json::from_str(&raw).map_err(|e| RpcError::InvalidResponse {
            method: method.to_owned(),
            message: e.to_string(),
            raw_output: raw.trim().to_owned(),
        })
    }

    /// Invoke `method` and return its output unparsed, trimmed of
    /// surrounding whitespace.
    pub async fn call_raw(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<String, RpcError> {
        let raw = self.transport.call(method, params).await?;
        Ok(raw.trim().to_owned())
    }

    async fn call_scalar<T>(&self, method: &str) -> Result<T, RpcError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.call_raw(method, &[]).await?;
        raw.parse().map_err(|e: T::Err| RpcError::InvalidResponse {
            method: method.to_owned(),
            message: e.to_string(),
            raw_output: raw.clone(),
        })
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        self.call("getblockchaininfo", &[]).await
    }

    pub async fn get_network_info(&self) -> Result<NetworkInfo, RpcError> {
        self.call("getnetworkinfo", &[]).await
    }

    /// Only the number of tips is used, so entries are not decoded.
    pub async fn get_chain_tips(&self) -> Result<Vec<IgnoredAny>, RpcError> {
        self.call("getchaintips", &[]).await
    }

    pub async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError> {
        self.call("getmempoolinfo", &[]).await
    }

    pub async fn get_net_totals(&self) -> Result<NetTotals, RpcError> {
        self.call("getnettotals", &[]).await
    }

    /// `getnetworkhashps` answers with a bare number, not a JSON object.
    pub async fn get_network_hash_ps(&self) -> Result<f64, RpcError> {
        self.call_scalar("getnetworkhashps").await
    }

    /// Seconds since the daemon started.
    pub async fn uptime(&self) -> Result<u64, RpcError> {
        self.call_scalar("uptime").await
    }

    pub async fn get_block(&self, hash: &BlockHash) -> Result<Block, RpcError> {
        debug!(block = %hash, "fetching block");
        self.call("getblock", &[serde_json::json!(hash.to_string())])
            .await
    }

    /// Decoded transaction; needs `txindex=1` for confirmed transactions.
    pub async fn get_raw_transaction(&self, txid: &Txid) -> Result<RawTransaction, RpcError> {
        self.call(
            "getrawtransaction",
            &[serde_json::json!(txid.to_string()), serde_json::json!(1)],
        )
        .await
    }
}
