use std::path::Path;

use tracing::warn;

use crate::error::CoreError;

pub const DEFAULT_CPU_TEMP_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_FAN_SPEED_PATH: &str = "/sys/class/hwmon/hwmon0/pwm1";

/// Read the first line of a sysfs-style file as a number.
pub async fn read_sensor(path: &Path) -> Result<f64, CoreError> {
    let sensor_err = |message: String| CoreError::SensorRead {
        path: path.to_path_buf(),
        message,
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| sensor_err(e.to_string()))?;
    let line = content.lines().next().unwrap_or_default().trim();
    line.parse::<f64>()
        .map_err(|e| sensor_err(format!("`{line}` is not a number: {e}")))
}

/// Like [`read_sensor`], but an unreadable sensor reads as zero.
pub async fn read_sensor_or_zero(path: &Path) -> f64 {
    match read_sensor(path).await {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "sensor unreadable, reporting 0");
            0.0
        }
    }
}
