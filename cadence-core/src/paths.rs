//! Centralized path configuration for cadence.
//!
//! Default locations for the config file and the record logs. Explicit paths
//! in the config file always win over these.

use std::path::PathBuf;

/// Config file name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "cadence.yml";

/// Get the cadence data directory.
///
/// Resolution order:
/// 1. `CADENCE_DATA_DIR` environment variable
/// 2. `<platform data dir>/cadence`
/// 3. current directory
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CADENCE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_dir().map(|d| d.join("cadence")).unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default config file path.
///
/// Resolution order:
/// 1. `CADENCE_CONFIG` environment variable
/// 2. `<platform config dir>/cadence/cadence.yml`
/// 3. `./cadence.yml`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CADENCE_CONFIG") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .map(|d| d.join("cadence").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Default sample log path.
pub fn sample_log_path() -> PathBuf {
    data_dir().join("samples.csv")
}

/// Default alert log path.
pub fn alert_log_path() -> PathBuf {
    data_dir().join("alerts.csv")
}
