use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use basemon_core::block::BlockInspector;
use basemon_core::rpc::{find_in_path, CliTransport, RpcClient};
use basemon_core::{MetricRegistry, PollConfig, PollPhase, Poller};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("basemon_core=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local regtest bitcoind with txindex=1 and bitcoin-cli in PATH"]
async fn regtest_cycle_publishes_chain_state() {
    init_tracing();

    let conf = env::var("BASEMON_TEST_BITCOIN_CONF")
        .map(PathBuf::from)
        .expect("BASEMON_TEST_BITCOIN_CONF must be set");
    let cli = find_in_path("bitcoin-cli").expect("bitcoin-cli must be installed");

    let rpc = RpcClient::new(Arc::new(CliTransport::new(
        cli,
        Some(conf.as_path()),
        Duration::from_secs(30),
    )));
    let registry = Arc::new(MetricRegistry::new());
    let mut poller = Poller::new(
        rpc.clone(),
        BlockInspector::new(rpc, true),
        registry.clone(),
        PollConfig::default(),
    )
    .expect("poller must build");

    let state = poller.run_cycle().await;
    assert_eq!(state.phase, PollPhase::Synced, "regtest leaves IBD after one block");

    let text = registry.encode().await.expect("encode");
    eprintln!("[itest] exposition:\n{text}");
    assert!(text.contains("bitcoin_network 3"));
    assert!(poller.metrics().latest_block_txs.get() >= 1);
    assert!(
        poller.metrics().latest_block_inputs.get() >= 1,
        "the coinbase input must be counted with txindex enabled"
    );
}
