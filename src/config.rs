//! Loads and applies defaults for the TOML configuration file, and builds
//! the log writer the loaded `[logging]` section describes.

use crate::error::{ConfigError, ParseSnafu, ReadSnafu};
use crate::log_writer::{ActiveLogWriter, LogLevel, LogWriter};
use crate::translator::UnitMap;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const OUTPUT_FILE_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DaemonSection {
    pub delay: u64,
}

impl Default for DaemonSection {
    fn default() -> Self {
        DaemonSection { delay: 30 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSection {
    pub enabled: bool,
    pub level: String,
    pub save_failed_writes: bool,
    pub failed_writes_fallback: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            enabled: true,
            level: "info".to_string(),
            save_failed_writes: true,
            failed_writes_fallback: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InfluxSection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub measurement: String,
}

impl Default for InfluxSection {
    fn default() -> Self {
        InfluxSection {
            host: "localhost".to_string(),
            port: 8086,
            database: "nagiosrecords".to_string(),
            measurement: "perfdata".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NagiosSection {
    pub spool_directory: String,
}

impl NagiosSection {
    fn default_for(app_name: &str) -> Self {
        NagiosSection {
            spool_directory: format!("/usr/local/nagios/var/spool/{app_name}"),
        }
    }
}

impl Default for NagiosSection {
    fn default() -> Self {
        NagiosSection::default_for("perfrelay")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RawConfig {
    pub daemon: DaemonSection,
    pub logging: LoggingSection,
    pub influx: InfluxSection,
    pub nagios: NagiosSection,
    pub unit_conversion_map: BTreeMap<String, String>,
}

/// Immutable snapshot produced by one [`load`] call. Cheap to clone; handed
/// by value to each iteration's time-series client and spool collector.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub delay: Duration,
    pub influx_host: String,
    pub influx_port: u16,
    pub influx_database: String,
    pub measurement: String,
    pub spool_directory: PathBuf,
    pub unit_map: UnitMap,
}

pub fn default_config_path(app_name: &str) -> PathBuf {
    PathBuf::from(format!("/etc/{app_name}/{app_name}d.toml"))
}

/// Loads the configuration at `path`, applying defaults for anything absent
/// or for a missing/unparsable file, and builds the log writer the
/// `[logging]` section describes.
pub fn load(path: &Path, app_name: &str) -> (RuntimeConfig, LogWriter) {
    let raw = match read_raw(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!("falling back to defaults: {err}");
            let mut raw = RawConfig::default();
            raw.nagios = NagiosSection::default_for(app_name);
            raw
        }
    };

    let mut unit_map = UnitMap::with_defaults();
    unit_map.merge(&raw.unit_conversion_map);

    let runtime = RuntimeConfig {
        delay: Duration::from_secs(raw.daemon.delay),
        influx_host: raw.influx.host,
        influx_port: raw.influx.port,
        influx_database: raw.influx.database,
        measurement: raw.influx.measurement,
        spool_directory: PathBuf::from(raw.nagios.spool_directory),
        unit_map,
    };

    let log_writer = build_log_writer(&raw.logging, app_name);

    (runtime, log_writer)
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = std::fs::read_to_string(path).context(ReadSnafu { path: path.to_path_buf() })?;
    toml::from_str(&text)
        .map_err(Box::new)
        .context(ParseSnafu { path: path.to_path_buf() })
}

fn build_log_writer(logging: &LoggingSection, app_name: &str) -> LogWriter {
    if !logging.enabled {
        return LogWriter::Passive;
    }
    let level = LogLevel::parse(&logging.level).unwrap_or(LogLevel::Info);
    let main_log = PathBuf::from(format!("/var/log/{app_name}/daemon.log"));
    let failed_writes = PathBuf::from(format!("/var/log/{app_name}/failed_writes.log"));
    LogWriter::Active(ActiveLogWriter::new(
        main_log,
        failed_writes,
        level,
        logging.save_failed_writes,
        logging.failed_writes_fallback,
        OUTPUT_FILE_IDLE_TIMEOUT,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let (runtime, _log) = load(&path, "perfrelay");
        assert_eq!(runtime.delay, Duration::from_secs(30));
        assert_eq!(runtime.influx_host, "localhost");
        assert_eq!(runtime.spool_directory, PathBuf::from("/usr/local/nagios/var/spool/perfrelay"));
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[influx]\nhost = \"tsdb.internal\"\n").unwrap();
        let (runtime, _log) = load(&path, "perfrelay");
        assert_eq!(runtime.influx_host, "tsdb.internal");
        assert_eq!(runtime.influx_port, 8086);
        assert_eq!(runtime.delay, Duration::from_secs(30));
    }

    #[test]
    fn unit_conversion_overrides_merge_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[unit_conversion_map]\nMB = \"megabytes\"\nwidgets = \"widget\"\n").unwrap();
        let (runtime, _log) = load(&path, "perfrelay");
        assert_eq!(runtime.unit_map.remap("MB"), "megabytes");
        assert_eq!(runtime.unit_map.remap("widgets"), "widget");
        assert_eq!(runtime.unit_map.remap("GB"), "decgbytes");
    }

    #[test]
    fn logging_disabled_yields_passive_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nenabled = false\n").unwrap();
        let (_runtime, log) = load(&path, "perfrelay");
        assert!(!log.should_write(LogLevel::Fatal));
    }
}
