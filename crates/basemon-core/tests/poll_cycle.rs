//! Poll loop behaviour through the public API, against a scripted daemon.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use basemon_core::block::BlockInspector;
use basemon_core::rpc::{RpcClient, RpcTransport};
use basemon_core::{MetricRegistry, PollConfig, PollPhase, Poller, RpcError};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Answers `getblockchaininfo` from a queue of scripted results; every other
/// method fails the way an unreachable daemon does.
struct ScriptedDaemon {
    status: Mutex<VecDeque<Option<serde_json::Value>>>,
}

impl ScriptedDaemon {
    fn new(status: impl IntoIterator<Item = Option<serde_json::Value>>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status.into_iter().collect()),
        })
    }
}

#[async_trait]
impl RpcTransport for ScriptedDaemon {
    async fn call(&self, method: &str, _params: &[serde_json::Value]) -> Result<String, RpcError> {
        let not_ready = || RpcError::Exit {
            method: method.to_owned(),
            exit_status: 28,
            raw_output: "error code: -28\nerror message:\nVerifying blocks...".to_owned(),
        };
        if method != "getblockchaininfo" {
            return Err(not_ready());
        }
        match self.status.lock().expect("status queue poisoned").pop_front() {
            Some(Some(value)) => Ok(value.to_string()),
            Some(None) | None => Err(not_ready()),
        }
    }
}

/// Levels of every event `basemon_core` emits while installed.
#[derive(Clone, Default)]
struct LogLevels(Arc<Mutex<Vec<Level>>>);

impl LogLevels {
    fn snapshot(&self) -> Vec<Level> {
        self.0.lock().expect("log levels poisoned").clone()
    }
}

impl<S: Subscriber> Layer<S> for LogLevels {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with("basemon_core") {
            self.0.lock().expect("log levels poisoned").push(*meta.level());
        }
    }
}

fn poller(daemon: Arc<ScriptedDaemon>) -> (Poller, Arc<MetricRegistry>) {
    let rpc = RpcClient::new(daemon);
    let registry = Arc::new(MetricRegistry::new());
    let poller = Poller::new(
        rpc.clone(),
        BlockInspector::new(rpc, false),
        registry.clone(),
        PollConfig::default(),
    )
    .expect("poller must build");
    (poller, registry)
}

#[tokio::test]
async fn two_not_ready_cycles_leave_the_registry_untouched() {
    let levels = LogLevels::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(levels.clone()));
    let (mut poller, registry) = poller(ScriptedDaemon::new([None, None]));

    poller.run_cycle().await;
    let after_first = registry.encode().await.expect("encode");
    let state = poller.run_cycle().await;
    let after_second = registry.encode().await.expect("encode");

    assert_eq!(levels.snapshot(), vec![Level::INFO, Level::INFO]);
    assert_eq!(after_first, after_second);
    assert_eq!(state.phase, PollPhase::WarmingUp);
    assert_eq!(state.delay, PollConfig::default().slow_interval);
    assert!(after_second.contains("bitcoin_warnings 0"));
}

#[tokio::test]
async fn daemon_becoming_ready_mid_sync_then_finishing() {
    let (mut poller, registry) = poller(ScriptedDaemon::new([
        None,
        Some(serde_json::json!({
            "chain": "test",
            "initialblockdownload": true,
            "blocks": 1_000,
            "headers": 2_500_000,
        })),
        Some(serde_json::json!({
            "chain": "test",
            "initialblockdownload": false,
            "blocks": 2_500_000,
            "headers": 2_500_000,
        })),
    ]));
    let config = PollConfig::default();

    let warming = poller.run_cycle().await;
    assert_eq!(warming.phase, PollPhase::WarmingUp);
    assert_eq!(warming.delay, config.slow_interval);

    let syncing = poller.run_cycle().await;
    assert_eq!(syncing.phase, PollPhase::Syncing);
    assert_eq!(syncing.delay, config.slow_interval);
    let text = registry.encode().await.expect("encode");
    assert!(text.contains("bitcoin_network 2"), "{text}");
    assert!(text.contains("bitcoin_ibd 1"), "{text}");
    assert!(text.contains("bitcoin_blocks 1000"), "{text}");

    let synced = poller.run_cycle().await;
    assert_eq!(synced.phase, PollPhase::Synced);
    assert_eq!(synced.delay, config.fast_interval);
    let text = registry.encode().await.expect("encode");
    assert!(text.contains("bitcoin_ibd 0"), "{text}");
    assert!(text.contains("bitcoin_blocks 2500000"), "{text}");
}
