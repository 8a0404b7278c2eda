use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{CoreError, RpcError};

use super::RpcTransport;

/// Runs `bitcoin-cli` once per RPC call.
///
/// The child is killed if it outlives `timeout` or if the calling future is
/// dropped, so a hung daemon cannot stall the poll loop.
pub struct CliTransport {
    program: PathBuf,
    conf_arg: Option<String>,
    timeout: Duration,
}

impl CliTransport {
    /// `conf` is passed as `-conf=<path>` ahead of the method name when set.
    pub fn new(program: impl Into<PathBuf>, conf: Option<&Path>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            conf_arg: conf.map(|path| format!("-conf={}", path.display())),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Resolve an executable name against `PATH`. Names containing a path
/// separator are checked as given.
pub fn find_in_path(name: &str) -> Result<PathBuf, CoreError> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(CoreError::Config(format!("`{name}` does not exist")))
        };
    }

    let path = std::env::var_os("PATH")
        .ok_or_else(|| CoreError::Config("PATH is not set".to_owned()))?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|full| full.is_file())
        .ok_or_else(|| CoreError::Config(format!("`{name}` was not found in PATH")))
}

// bitcoin-cli converts positional arguments itself, so strings go through
// verbatim and everything else as its JSON text.
fn cli_arg(param: &serde_json::Value) -> String {
    match param {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RpcTransport for CliTransport {
    async fn call(&self, method: &str, params: &[serde_json::Value]) -> Result<String, RpcError> {
        let mut command = Command::new(&self.program);
        if let Some(conf) = &self.conf_arg {
            command.arg(conf);
        }
        command
            .arg(method)
            .args(params.iter().map(cli_arg))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(rpc.method = method, rpc.params = params.len(), "bitcoin-cli call");
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RpcError::Timeout {
                method: method.to_owned(),
                timeout: self.timeout,
            })?
            .map_err(|source| RpcError::Spawn {
                program: self.program.display().to_string(),
                method: method.to_owned(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(rpc.method = method, body = %stdout, "bitcoin-cli output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let raw_output = match (stderr.trim(), stdout.trim()) {
                ("", out) => out.to_owned(),
                (err, "") => err.to_owned(),
                (err, out) => format!("{err}\n{out}"),
            };
            return Err(RpcError::Exit {
                method: method.to_owned(),
                // Killed by a signal.
                exit_status: output.status.code().unwrap_or(-1),
                raw_output,
            });
        }

        Ok(stdout)
    }
}
