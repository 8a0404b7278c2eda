use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// basemon: Prometheus exporter for a Bitcoin node appliance.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Export bitcoind chain, network and mempool metrics.
    Bitcoind(BitcoindArgs),
    /// Export host temperature, fan speed and service states.
    Host(HostArgs),
}

#[derive(Args)]
pub struct BitcoindArgs {
    /// bitcoin-cli executable, looked up in PATH unless it contains a `/`.
    #[arg(long, default_value = "bitcoin-cli", env = "BASEMON_BITCOIN_CLI")]
    pub bitcoin_cli: String,

    /// bitcoin.conf passed to bitcoin-cli as `-conf=`. Empty to omit.
    #[arg(
        long,
        default_value = "/etc/bitcoin/bitcoin.conf",
        env = "BASEMON_BITCOIN_CONF"
    )]
    pub bitcoin_conf: String,

    /// Talk JSON-RPC over HTTP to this URL instead of running bitcoin-cli.
    #[arg(long, env = "BASEMON_RPC_URL")]
    pub rpc_url: Option<String>,

    /// RPC username (HTTP transport only).
    #[arg(long, env = "BASEMON_RPC_USER", requires = "rpc_url")]
    pub rpc_user: Option<String>,

    /// RPC password (HTTP transport only).
    #[arg(long, env = "BASEMON_RPC_PASS", requires = "rpc_url")]
    pub rpc_pass: Option<String>,

    /// bitcoind cookie file, used when no user/pass is given (HTTP transport only).
    #[arg(long, env = "BASEMON_RPC_COOKIE_FILE", requires = "rpc_url")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Count inputs and outputs of the latest block. Needs bitcoind with
    /// txindex=1 and costs one RPC call per transaction.
    #[arg(long, env = "BASEMON_TXINDEX")]
    pub txindex: bool,

    /// Seconds between polls while bitcoind is warming up or syncing.
    #[arg(long, default_value = "360", env = "BASEMON_SLOW_INTERVAL")]
    pub slow_interval: u64,

    /// Seconds between polls once bitcoind is synced.
    #[arg(long, default_value = "30", env = "BASEMON_FAST_INTERVAL")]
    pub fast_interval: u64,

    /// Seconds before a single RPC call is abandoned.
    #[arg(long, default_value = "30", env = "BASEMON_RPC_TIMEOUT")]
    pub rpc_timeout: u64,

    /// Address to bind the metrics endpoint to.
    #[arg(long, default_value = "127.0.0.1", env = "BASEMON_BIND")]
    pub bind: String,

    /// Port to serve metrics on.
    #[arg(long, default_value = "8334", env = "BASEMON_PORT")]
    pub port: u16,
}

#[derive(Args)]
pub struct HostArgs {
    /// Seconds between collections.
    #[arg(long, default_value = "10", env = "BASEMON_HOST_INTERVAL")]
    pub interval: u64,

    /// Directory holding HOSTNAME, BUILD_DATE, BUILD_TIME and BUILD_COMMIT.
    #[arg(long, default_value = "/opt/shift/sysconfig", env = "BASEMON_SYSCONFIG_DIR")]
    pub sysconfig_dir: PathBuf,

    /// Sensor file read for the CPU temperature.
    #[arg(
        long,
        default_value = "/sys/class/thermal/thermal_zone0/temp",
        env = "BASEMON_CPU_TEMP_PATH"
    )]
    pub cpu_temp_path: PathBuf,

    /// Sensor file read for the fan speed.
    #[arg(
        long,
        default_value = "/sys/class/hwmon/hwmon0/pwm1",
        env = "BASEMON_FAN_SPEED_PATH"
    )]
    pub fan_speed_path: PathBuf,

    /// Systemd units to probe (repeatable, or comma-separated in the env var).
    #[arg(
        long = "unit",
        env = "BASEMON_UNITS",
        value_delimiter = ',',
        default_values_t = ["bitcoind", "electrs", "lightningd", "prometheus", "grafana-server"].map(String::from)
    )]
    pub units: Vec<String>,

    /// Address to bind the metrics endpoint to.
    #[arg(long, default_value = "127.0.0.1", env = "BASEMON_BIND")]
    pub bind: String,

    /// Port to serve metrics on.
    #[arg(long, default_value = "8400", env = "BASEMON_PORT")]
    pub port: u16,
}
