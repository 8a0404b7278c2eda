use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;

/// State of a service-manager unit.
///
/// Codes follow `systemctl is-active` exit statuses: 0 when active,
/// otherwise the non-zero status (3 for inactive or failed units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Active,
    NotActive(i32),
}

impl UnitStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Active => 0,
            Self::NotActive(code) => i64::from(code),
        }
    }
}

#[async_trait]
pub trait UnitProbe: Send + Sync {
    async fn status(&self, unit: &str) -> Result<UnitStatus, CoreError>;
}

/// Probes units with `systemctl is-active <unit>`.
pub struct SystemctlProbe {
    program: PathBuf,
    timeout: Duration,
}

impl SystemctlProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("systemctl"),
            timeout,
        }
    }

    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl UnitProbe for SystemctlProbe {
    async fn status(&self, unit: &str) -> Result<UnitStatus, CoreError> {
        let mut command = Command::new(&self.program);
        command
            .arg("is-active")
            .arg(unit)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("systemctl is-active {unit} timed out"),
                )
            })??;

        let state = String::from_utf8_lossy(&output.stdout);
        debug!(unit, state = %state.trim(), status = ?output.status.code(), "unit probed");

        match output.status.code() {
            Some(0) => Ok(UnitStatus::Active),
            Some(code) => Ok(UnitStatus::NotActive(code)),
            None => Err(CoreError::Io(std::io::Error::other(format!(
                "systemctl is-active {unit} was killed by a signal"
            )))),
        }
    }
}
