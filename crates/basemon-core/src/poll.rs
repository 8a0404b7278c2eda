//! The adaptive poll loop.
//!
//! Each cycle asks bitcoind for its chain status, gathers the secondary
//! figures (network, chain tips, mempool, traffic, hash rate, latest block)
//! one call at a time, publishes them as one batch, and picks the next delay:
//! slow while the daemon is in initial block download, fast once it has
//! caught up. A failed status call publishes nothing and retries after the
//! current delay. No failure ends the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::block::BlockInspector;
use crate::error::{CoreError, ErrorPolicy};
use crate::metrics::{DaemonMetrics, MetricRegistry};
use crate::rpc::RpcClient;
use crate::types::{BlockSummary, Chain, DaemonStatus};

pub const DEFAULT_SLOW_INTERVAL: Duration = Duration::from_secs(360);
pub const DEFAULT_FAST_INTERVAL: Duration = Duration::from_secs(30);

// ==============================================================================
// Configuration and State
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between cycles while the daemon is warming up or syncing.
    pub slow_interval: Duration,
    /// Delay between cycles once the daemon has left initial block download.
    pub fast_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            slow_interval: DEFAULT_SLOW_INTERVAL,
            fast_interval: DEFAULT_FAST_INTERVAL,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.slow_interval.is_zero() || self.fast_interval.is_zero() {
            return Err(CoreError::Config(
                "poll intervals must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn delay_for(&self, initial_block_download: bool) -> Duration {
        if initial_block_download {
            self.slow_interval
        } else {
            self.fast_interval
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// The daemon has not answered a status call yet (or stopped answering).
    WarmingUp,
    /// The daemon answers and reports initial block download.
    Syncing,
    Synced,
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WarmingUp => write!(f, "warming_up"),
            Self::Syncing => write!(f, "syncing"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

/// The only state that outlives a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub phase: PollPhase,
    pub delay: Duration,
}

impl PollState {
    pub fn initial(config: &PollConfig) -> Self {
        Self {
            phase: PollPhase::WarmingUp,
            delay: config.slow_interval,
        }
    }
}

// ==============================================================================
// Poller
// ==============================================================================

pub struct Poller {
    rpc: RpcClient,
    inspector: BlockInspector,
    registry: Arc<MetricRegistry>,
    metrics: DaemonMetrics,
    config: PollConfig,
    state: PollState,
}

impl Poller {
    /// Build a poller and register the daemon metrics in `registry`.
    pub fn new(
        rpc: RpcClient,
        inspector: BlockInspector,
        registry: Arc<MetricRegistry>,
        config: PollConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let metrics = DaemonMetrics::register(&registry)?;
        Ok(Self {
            rpc,
            inspector,
            registry,
            metrics,
            config,
            state: PollState::initial(&config),
        })
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn metrics(&self) -> &DaemonMetrics {
        &self.metrics
    }

    /// Run one cycle and return the state that schedules the next one.
    pub async fn run_cycle(&mut self) -> PollState {
        match self.collect().await {
            Ok((status, block)) => {
                let metrics = &self.metrics;
                self.registry
                    .publish(|| metrics.apply(&status, block.as_ref()))
                    .await;

                let ibd = status.initial_block_download;
                self.state = PollState {
                    phase: if ibd {
                        PollPhase::Syncing
                    } else {
                        PollPhase::Synced
                    },
                    delay: self.config.delay_for(ibd),
                };
                info!(
                    chain = %status.chain,
                    blocks = status.blocks,
                    headers = status.headers,
                    phase = %self.state.phase,
                    next_poll_secs = self.state.delay.as_secs(),
                    "bitcoind metrics updated"
                );
            }
            Err(err) => {
                if err.policy() != ErrorPolicy::AbortCycle {
                    error!(error = %err, "unexpected failure kind for the status call");
                }
                self.state.phase = PollPhase::WarmingUp;
                info!(
                    error = %err,
                    next_poll_secs = self.state.delay.as_secs(),
                    "could not get data, bitcoind still warming up?"
                );
            }
        }
        self.state
    }

    /// Poll until `shutdown` resolves. Shutdown is honored mid-cycle as well
    /// as during the sleep between cycles; an interrupted cycle publishes
    /// nothing.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            slow_secs = self.config.slow_interval.as_secs(),
            fast_secs = self.config.fast_interval.as_secs(),
            detailed_accounting = self.inspector.detailed_accounting(),
            "starting bitcoind poll loop"
        );

        loop {
            let state = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                state = self.run_cycle() => state,
            };
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(state.delay) => {}
            }
        }
        info!("bitcoind poll loop stopped");
    }

    async fn collect(&self) -> Result<(DaemonStatus, Option<BlockSummary>), CoreError> {
        let info = self
            .rpc
            .get_blockchain_info()
            .await
            .map_err(CoreError::DaemonUnavailable)?;

        let network = secondary(self.rpc.get_network_info().await);
        let chain_tips = secondary(self.rpc.get_chain_tips().await);
        let mempool = secondary(self.rpc.get_mempool_info().await);
        let net_totals = secondary(self.rpc.get_net_totals().await);
        let block = match info.best_block_hash {
            Some(hash) => secondary(self.inspector.fetch_block(&hash).await),
            None => {
                debug!("no best block hash reported; latest block metrics unchanged");
                None
            }
        };
        let hash_rate = secondary(self.rpc.get_network_hash_ps().await);
        let uptime = secondary(self.rpc.uptime().await);

        let status = DaemonStatus {
            chain: Chain::from_name(&info.chain),
            initial_block_download: info.initial_block_download,
            blocks: info.blocks,
            headers: info.headers,
            verification_progress: info.verification_progress,
            difficulty: info.difficulty,
            best_block_hash: info.best_block_hash,
            peers: network.as_ref().map(|n| n.connections),
            warning: network.as_ref().map(|n| n.warnings.is_present()),
            hash_rate,
            uptime,
            chain_tips: chain_tips.map(|tips| tips.len() as u64),
            mempool,
            net_totals,
        };
        Ok((status, block))
    }
}

/// Apply the failure policy to a secondary call: log and drop failures so
/// the matching metrics keep their previous values.
fn secondary<T, E>(result: Result<T, E>) -> Option<T>
where
    E: Into<CoreError>,
{
    let err = match result {
        Ok(value) => return Some(value),
        Err(err) => err.into(),
    };
    match err.policy() {
        ErrorPolicy::SkipMetric | ErrorPolicy::ZeroContribution => {
            warn!(error = %err, "metric unavailable this cycle");
        }
        ErrorPolicy::RetainStale => {
            warn!(error = %err, "keeping previous latest block metrics");
        }
        ErrorPolicy::AbortCycle | ErrorPolicy::Fatal => {
            error!(error = %err, "unexpected failure in secondary call; metric skipped");
        }
    }
    None
}
