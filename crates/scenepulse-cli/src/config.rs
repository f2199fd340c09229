//! Configuration Vault – reads/writes `~/.scenepulse/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scenepulse_perf::MonitorConfig;
use scenepulse_runtime::{BenchmarkConfig, CoordinatorConfig};
use scenepulse_scene::{LodConfig, LodLevel, validate_levels};
use scenepulse_transport::TransportConfig;
use scenepulse_types::PulseError;

/// Persisted user configuration stored in `~/.scenepulse/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the sensor hub.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Frames kept by the performance monitor.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Samples per benchmark phase.
    #[serde(default = "default_benchmark_samples")]
    pub benchmark_samples: usize,

    #[serde(default = "default_benchmark_cadence_ms")]
    pub benchmark_cadence_ms: u64,

    /// Pause between the optimisation pass and optimized sampling.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_max_lod_conversions")]
    pub max_lod_conversions: usize,

    #[serde(default = "default_lod_material_strip_distance")]
    pub lod_material_strip_distance: f32,

    #[serde(default = "LodLevel::default_levels")]
    pub lod_levels: Vec<LodLevel>,

    /// Where exported JSON reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_endpoint_url() -> String {
    TransportConfig::default().url
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_history_capacity() -> usize {
    300
}
fn default_benchmark_samples() -> usize {
    15
}
fn default_benchmark_cadence_ms() -> u64 {
    1000
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_max_lod_conversions() -> usize {
    6
}
fn default_lod_material_strip_distance() -> f32 {
    10.0
}
fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            history_capacity: default_history_capacity(),
            benchmark_samples: default_benchmark_samples(),
            benchmark_cadence_ms: default_benchmark_cadence_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            max_lod_conversions: default_max_lod_conversions(),
            lod_material_strip_distance: default_lod_material_strip_distance(),
            lod_levels: LodLevel::default_levels(),
            report_dir: default_report_dir(),
        }
    }
}

impl Config {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            url: self.endpoint_url.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    /// Per-crate settings for the coordinator. Fails on an invalid
    /// `lod_levels` table.
    pub fn coordinator(&self) -> Result<CoordinatorConfig, PulseError> {
        validate_levels(&self.lod_levels)
            .map_err(|e| PulseError::Config(format!("lod_levels: {e}")))?;
        Ok(CoordinatorConfig {
            monitor: MonitorConfig {
                history_capacity: self.history_capacity,
            },
            lod: LodConfig {
                material_strip_distance: self.lod_material_strip_distance,
                default_levels: self.lod_levels.clone(),
            },
            benchmark: BenchmarkConfig {
                samples: self.benchmark_samples,
                cadence: Duration::from_millis(self.benchmark_cadence_ms),
                settle: Duration::from_millis(self.settle_delay_ms),
            },
            max_lod_conversions: self.max_lod_conversions,
        })
    }
}

/// Return the path to `~/.scenepulse/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".scenepulse").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, PulseError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, PulseError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PulseError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| PulseError::Config(format!("failed to parse: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SCENEPULSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SCENEPULSE_ENDPOINT` | `endpoint_url` |
/// | `SCENEPULSE_RECONNECT_DELAY_MS` | `reconnect_delay_ms` |
/// | `SCENEPULSE_MAX_RECONNECT_ATTEMPTS` | `max_reconnect_attempts` |
/// | `SCENEPULSE_REPORT_DIR` | `report_dir` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SCENEPULSE_ENDPOINT") {
        cfg.endpoint_url = v;
    }
    if let Ok(v) = std::env::var("SCENEPULSE_RECONNECT_DELAY_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.reconnect_delay_ms = ms;
    }
    if let Ok(v) = std::env::var("SCENEPULSE_MAX_RECONNECT_ATTEMPTS")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.max_reconnect_attempts = n;
    }
    if let Ok(v) = std::env::var("SCENEPULSE_REPORT_DIR") {
        cfg.report_dir = PathBuf::from(v);
    }
}

/// Built-in defaults with the environment overrides applied, for when no
/// usable config file exists. Nothing is persisted.
pub fn defaults_with_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Save the config to disk, creating `~/.scenepulse/` if necessary.
pub fn save(cfg: &Config) -> Result<(), PulseError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), PulseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PulseError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                PulseError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PulseError::Config(format!("failed to serialize: {e}")))?;
    let write_err =
        |e: std::io::Error| PulseError::Config(format!("failed to write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.history_capacity, 300);
        assert_eq!(loaded.benchmark_samples, 15);
        assert_eq!(loaded.lod_levels, LodLevel::default_levels());
        assert_eq!(loaded.max_lod_conversions, 6);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: Config = toml::from_str("benchmark_samples = 3").expect("parse");
        assert_eq!(cfg.benchmark_samples, 3);
        assert_eq!(cfg.settle_delay_ms, 1000);
        assert_eq!(cfg.lod_material_strip_distance, 10.0);
    }

    #[test]
    fn lod_levels_parse_from_table_array() {
        let raw = r#"
            [[lod_levels]]
            distance = 0.0
            detail_fraction = 1.0

            [[lod_levels]]
            distance = 20.0
            detail_fraction = 0.3
        "#;
        let cfg: Config = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.lod_levels, vec![LodLevel::new(0.0, 1.0), LodLevel::new(20.0, 0.3)]);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_capacity = \"lots\"").unwrap();
        assert!(matches!(load_from(&path), Err(PulseError::Config(_))));
    }

    #[test]
    fn config_path_points_to_scenepulse_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".scenepulse"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn converts_into_crate_configs() {
        let cfg = Config {
            benchmark_samples: 4,
            benchmark_cadence_ms: 250,
            reconnect_delay_ms: 10,
            ..Config::default()
        };
        let transport = cfg.transport();
        assert_eq!(transport.reconnect_delay, Duration::from_millis(10));
        assert_eq!(transport.max_reconnect_attempts, 5);

        let coordinator = cfg.coordinator().expect("valid");
        assert_eq!(coordinator.benchmark.samples, 4);
        assert_eq!(coordinator.benchmark.cadence, Duration::from_millis(250));
        assert_eq!(coordinator.monitor.history_capacity, 300);
        assert_eq!(coordinator.lod.default_levels.len(), 3);
    }

    #[test]
    fn invalid_lod_levels_are_a_config_error() {
        let cfg = Config {
            lod_levels: vec![LodLevel::new(10.0, 0.5), LodLevel::new(5.0, 0.25)],
            ..Config::default()
        };
        assert!(matches!(cfg.coordinator(), Err(PulseError::Config(_))));
    }

    #[test]
    fn apply_env_overrides_changes_endpoint() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("SCENEPULSE_ENDPOINT", "ws://hub.local:9000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.endpoint_url, "ws://hub.local:9000");
        unsafe { std::env::remove_var("SCENEPULSE_ENDPOINT") };
    }

    #[test]
    fn apply_env_overrides_changes_reconnect_delay() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("SCENEPULSE_RECONNECT_DELAY_MS", "750") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.reconnect_delay_ms, 750);
        unsafe { std::env::remove_var("SCENEPULSE_RECONNECT_DELAY_MS") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_attempts() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("SCENEPULSE_MAX_RECONNECT_ATTEMPTS", "many") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_reconnect_attempts, 5);
        unsafe { std::env::remove_var("SCENEPULSE_MAX_RECONNECT_ATTEMPTS") };
    }

    #[test]
    fn defaults_without_a_file_still_honour_env_overrides() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("SCENEPULSE_REPORT_DIR", "/tmp/reports") };
        let cfg = defaults_with_env();
        unsafe { std::env::remove_var("SCENEPULSE_REPORT_DIR") };

        assert_eq!(cfg.report_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(cfg.history_capacity, 300);
    }
}
