//! Host health collection: temperature and fan sensors, service-manager
//! unit states, and the appliance's build identity.
//!
//! Runs on a fixed interval. Every read happens before the batch is
//! published, and no read failure stops the loop.

pub mod sensors;
pub mod systemd;
pub mod sysinfo;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Gauge, IntGaugeVec, Opts};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::metrics::MetricRegistry;
use sensors::{read_sensor_or_zero, DEFAULT_CPU_TEMP_PATH, DEFAULT_FAN_SPEED_PATH};
use sysinfo::{read_system_info, DEFAULT_SYSCONFIG_DIR, SYSTEM_INFO_LABELS};
use systemd::UnitProbe;

pub const DEFAULT_HOST_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_UNITS: [&str; 5] = [
    "bitcoind",
    "electrs",
    "lightningd",
    "prometheus",
    "grafana-server",
];

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub interval: Duration,
    pub sysconfig_dir: PathBuf,
    pub cpu_temp_path: PathBuf,
    pub fan_speed_path: PathBuf,
    pub units: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HOST_INTERVAL,
            sysconfig_dir: PathBuf::from(DEFAULT_SYSCONFIG_DIR),
            cpu_temp_path: PathBuf::from(DEFAULT_CPU_TEMP_PATH),
            fan_speed_path: PathBuf::from(DEFAULT_FAN_SPEED_PATH),
            units: DEFAULT_UNITS.iter().map(|u| (*u).to_owned()).collect(),
        }
    }
}

// ==============================================================================
// Host Metrics
// ==============================================================================

#[derive(Clone)]
pub struct HostMetrics {
    pub cpu_temp: Gauge,
    pub fan_speed: Gauge,
    pub unit_status: IntGaugeVec,
    pub system_info: IntGaugeVec,
}

impl HostMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self, CoreError> {
        Ok(Self {
            cpu_temp: registry.register(Gauge::new("base_cpu_temp", "CPU temperature")?)?,
            fan_speed: registry.register(Gauge::new("base_fan_speed", "Fan speed in %")?)?,
            unit_status: registry.register(IntGaugeVec::new(
                Opts::new(
                    "base_systemd_unit_status",
                    "Systemd unit status (0 = active, otherwise systemctl is-active exit status)",
                ),
                &["unit"],
            )?)?,
            system_info: registry.register(IntGaugeVec::new(
                Opts::new("base_system_info", "System information"),
                &SYSTEM_INFO_LABELS,
            )?)?,
        })
    }
}

/// One round of host readings, gathered before anything is published.
#[derive(Debug, Clone, PartialEq)]
struct HostReadings {
    cpu_temp: f64,
    fan_speed: f64,
    units: Vec<(String, i64)>,
    system_info: [String; 4],
}

// ==============================================================================
// Collector
// ==============================================================================

pub struct HostCollector {
    config: HostConfig,
    probe: Arc<dyn UnitProbe>,
    registry: Arc<MetricRegistry>,
    metrics: HostMetrics,
}

impl HostCollector {
    pub fn new(
        config: HostConfig,
        probe: Arc<dyn UnitProbe>,
        registry: Arc<MetricRegistry>,
    ) -> Result<Self, CoreError> {
        if config.interval.is_zero() {
            return Err(CoreError::Config(
                "host collection interval must be greater than zero".to_owned(),
            ));
        }
        let metrics = HostMetrics::register(&registry)?;
        Ok(Self {
            config,
            probe,
            registry,
            metrics,
        })
    }

    pub fn metrics(&self) -> &HostMetrics {
        &self.metrics
    }

    async fn read(&self) -> HostReadings {
        let mut units = Vec::with_capacity(self.config.units.len());
        for unit in &self.config.units {
            match self.probe.status(unit).await {
                Ok(status) => units.push((unit.clone(), status.code())),
                Err(err) => warn!(unit = %unit, error = %err, "unit probe failed; keeping previous value"),
            }
        }

        HostReadings {
            cpu_temp: read_sensor_or_zero(&self.config.cpu_temp_path).await,
            fan_speed: read_sensor_or_zero(&self.config.fan_speed_path).await,
            units,
            system_info: read_system_info(&self.config.sysconfig_dir).await,
        }
    }

    pub async fn collect_once(&self) {
        let readings = self.read().await;
        let metrics = &self.metrics;
        self.registry
            .publish(|| {
                metrics.cpu_temp.set(readings.cpu_temp);
                metrics.fan_speed.set(readings.fan_speed);
                for (unit, code) in &readings.units {
                    metrics.unit_status.with_label_values(&[unit.as_str()]).set(*code);
                }
                let labels: Vec<&str> = readings.system_info.iter().map(String::as_str).collect();
                metrics.system_info.reset();
                metrics.system_info.with_label_values(&labels).set(1);
            })
            .await;
    }

    /// Collect every `interval` until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            interval_secs = self.config.interval.as_secs(),
            units = self.config.units.len(),
            "starting host collector"
        );
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.collect_once() => {}
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        info!("host collector stopped");
    }
}
