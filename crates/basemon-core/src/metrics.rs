//! Prometheus metric registry with batch publication.
//!
//! The poll loop is the single writer; scrapes are the readers. Writers
//! apply a whole cycle's values under the write side of `gate`, and
//! [`MetricRegistry::encode`] gathers under the read side, so a scrape never
//! sees half of a batch. The lock is held only while values are stored,
//! never across RPC calls.

use prometheus::core::Collector;
use prometheus::{Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::{BlockSummary, DaemonStatus};

/// Content type of [`MetricRegistry::encode`] output.
pub const TEXT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

// ==============================================================================
// Registry
// ==============================================================================

pub struct MetricRegistry {
    registry: Registry,
    gate: RwLock<()>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gate: RwLock::new(()),
        }
    }

    /// Register a metric and hand back a handle to it.
    pub fn register<M>(&self, metric: M) -> Result<M, CoreError>
    where
        M: Collector + Clone + 'static,
    {
        self.registry.register(Box::new(metric.clone()))?;
        Ok(metric)
    }

    /// Run `apply` with scrapes excluded, so every value it sets becomes
    /// visible at once.
    pub async fn publish<F: FnOnce()>(&self, apply: F) {
        let _guard = self.gate.write().await;
        apply();
    }

    /// Render every registered metric in the Prometheus text format.
    pub async fn encode(&self) -> Result<String, CoreError> {
        let families = {
            let _guard = self.gate.read().await;
            self.registry.gather()
        };
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Store a daemon-reported count in an `IntGauge`, saturating at `i64::MAX`.
pub(crate) fn set_count(gauge: &IntGauge, value: u64) {
    gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
}

// ==============================================================================
// Daemon Metrics
// ==============================================================================

/// Handles for every bitcoind-derived metric.
#[derive(Clone)]
pub struct DaemonMetrics {
    pub network: IntGauge,
    pub ibd: IntGauge,
    pub verification_progress: Gauge,
    pub blocks: IntGauge,
    pub headers: IntGauge,
    pub peers: IntGauge,
    pub difficulty: Gauge,
    pub hashps: Gauge,
    pub warnings: IntCounter,
    pub uptime: IntGauge,
    pub mempool_bytes: IntGauge,
    pub mempool_size: IntGauge,
    pub latest_block_size: IntGauge,
    pub latest_block_txs: IntGauge,
    pub latest_block_inputs: IntGauge,
    pub latest_block_outputs: IntGauge,
    pub num_chaintips: IntGauge,
    pub total_bytes_recv: IntGauge,
    pub total_bytes_sent: IntGauge,
}

impl DaemonMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self, CoreError> {
        let int_gauge = |name: &str, help: &str| -> Result<IntGauge, CoreError> {
            registry.register(IntGauge::new(name, help)?)
        };
        let gauge = |name: &str, help: &str| -> Result<Gauge, CoreError> {
            registry.register(Gauge::new(name, help)?)
        };

        Ok(Self {
            network: int_gauge("bitcoin_network", "Bitcoin network (1=main/2=test/3=reg/0=unknown)")?,
            ibd: int_gauge("bitcoin_ibd", "Bitcoin is in Initial Block Download mode")?,
            verification_progress: gauge(
                "bitcoin_verification_progress",
                "Verification progress of blockchain (0 to 1)",
            )?,
            blocks: int_gauge("bitcoin_blocks", "Block height")?,
            headers: int_gauge("bitcoin_headers", "Block headers")?,
            peers: int_gauge("bitcoin_peers", "Number of peers")?,
            difficulty: gauge("bitcoin_difficulty", "Difficulty")?,
            hashps: gauge("bitcoin_hashps", "Estimated network hash rate per second")?,
            warnings: registry.register(IntCounter::new(
                "bitcoin_warnings",
                "Number of warnings detected",
            )?)?,
            uptime: int_gauge(
                "bitcoin_uptime",
                "Number of seconds the Bitcoin daemon has been running",
            )?,
            mempool_bytes: int_gauge("bitcoin_mempool_bytes", "Size of mempool in bytes")?,
            mempool_size: int_gauge(
                "bitcoin_mempool_size",
                "Number of unconfirmed transactions in mempool",
            )?,
            latest_block_size: int_gauge(
                "bitcoin_latest_block_size",
                "Size of latest block in bytes",
            )?,
            latest_block_txs: int_gauge(
                "bitcoin_latest_block_txs",
                "Number of transactions in latest block",
            )?,
            latest_block_inputs: int_gauge(
                "bitcoin_latest_block_inputs",
                "Number of inputs in transactions of latest block",
            )?,
            latest_block_outputs: int_gauge(
                "bitcoin_latest_block_outputs",
                "Number of outputs in transactions of latest block",
            )?,
            num_chaintips: int_gauge(
                "bitcoin_num_chaintips",
                "Number of known blockchain branches",
            )?,
            total_bytes_recv: int_gauge("bitcoin_total_bytes_recv", "Total bytes received")?,
            total_bytes_sent: int_gauge("bitcoin_total_bytes_sent", "Total bytes sent")?,
        })
    }

    /// Store one cycle's values. Fields that are `None` leave their metric
    /// untouched; a `None` block leaves all latest-block metrics untouched.
    ///
    /// Call inside [`MetricRegistry::publish`].
    pub fn apply(&self, status: &DaemonStatus, block: Option<&BlockSummary>) {
        self.network.set(status.chain.code());
        self.ibd.set(status.ibd_code());
        set_count(&self.blocks, status.blocks);
        set_count(&self.headers, status.headers);
        if let Some(progress) = status.verification_progress {
            self.verification_progress.set(progress);
        }
        if let Some(difficulty) = status.difficulty {
            self.difficulty.set(difficulty);
        }

        if let Some(peers) = status.peers {
            set_count(&self.peers, peers);
        }
        if status.warning == Some(true) {
            self.warnings.inc();
        }
        if let Some(hashps) = status.hash_rate {
            self.hashps.set(hashps);
        }
        if let Some(uptime) = status.uptime {
            set_count(&self.uptime, uptime);
        }
        if let Some(tips) = status.chain_tips {
            set_count(&self.num_chaintips, tips);
        }
        if let Some(mempool) = status.mempool {
            set_count(&self.mempool_bytes, mempool.bytes);
            set_count(&self.mempool_size, mempool.size);
        }
        if let Some(totals) = status.net_totals {
            set_count(&self.total_bytes_recv, totals.total_bytes_recv);
            set_count(&self.total_bytes_sent, totals.total_bytes_sent);
        }

        if let Some(block) = block {
            set_count(&self.latest_block_size, block.size);
            set_count(&self.latest_block_txs, block.tx_count);
            set_count(&self.latest_block_inputs, block.inputs);
            set_count(&self.latest_block_outputs, block.outputs);
        }
    }
}
