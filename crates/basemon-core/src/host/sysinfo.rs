use std::path::Path;

use tracing::debug;

pub const DEFAULT_SYSCONFIG_DIR: &str = "/opt/shift/sysconfig";

/// Files read from the sysconfig directory, in label order.
pub const SYSTEM_INFO_KEYS: [&str; 4] = ["HOSTNAME", "BUILD_DATE", "BUILD_TIME", "BUILD_COMMIT"];

/// Label names for [`SYSTEM_INFO_KEYS`].
pub const SYSTEM_INFO_LABELS: [&str; 4] = ["hostname", "build_date", "build_time", "build_commit"];

const UNKNOWN: &str = "n/a";

/// Read the appliance's identity from `KEY=value` files, one per key.
///
/// Returns values in [`SYSTEM_INFO_KEYS`] order; missing or malformed files
/// yield `n/a`.
pub async fn read_system_info(dir: &Path) -> [String; 4] {
    let mut values: [String; 4] = Default::default();
    for (value, key) in values.iter_mut().zip(SYSTEM_INFO_KEYS) {
        let path = dir.join(key);
        *value = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_assignment(&content).unwrap_or_else(|| UNKNOWN.to_owned()),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "sysconfig entry unavailable");
                UNKNOWN.to_owned()
            }
        };
    }
    values
}

/// Value of the first `KEY=value` line, with shell quotes stripped.
fn parse_assignment(content: &str) -> Option<String> {
    let (_, value) = content.lines().next()?.split_once('=')?;
    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_owned())
}
