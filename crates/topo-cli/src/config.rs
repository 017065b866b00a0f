//! Persistent settings – reads/writes `~/.topo/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use topo_perception::config::ExtractionConfig;
use topo_types::TopoError;

/// Settings stored in `~/.topo/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket port of the rosbridge endpoint.
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,

    /// Newest history points kept in the history marker.
    #[serde(default = "default_history_max_points")]
    pub history_max_points: usize,

    /// Sensing window and thresholding.
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

fn default_bridge_port() -> u16 {
    9090
}
fn default_history_max_points() -> usize {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_port: default_bridge_port(),
            history_max_points: default_history_max_points(),
            extraction: ExtractionConfig::default(),
        }
    }
}

/// Return the path to `~/.topo/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".topo").join("config.toml")
}

/// Load the config from disk with environment overrides applied.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, TopoError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TopoError> {
    let Some(mut cfg) = read_from(path)? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Parse the file as written, without overrides.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, TopoError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TopoError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| TopoError::Config(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `TOPO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TOPO_BRIDGE_PORT` | `bridge_port` |
/// | `TOPO_THRESHOLD` | `extraction.occupancy_threshold` |
/// | `TOPO_RESOLUTION` | `extraction.resolution` |
/// | `TOPO_RADIUS` | `extraction.scan_radius` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(port) = env_parse::<u16>("TOPO_BRIDGE_PORT") {
        cfg.bridge_port = port;
    }
    if let Some(threshold) = env_parse::<u8>("TOPO_THRESHOLD") {
        cfg.extraction.occupancy_threshold = threshold;
    }
    if let Some(resolution) = env_parse::<f32>("TOPO_RESOLUTION") {
        cfg.extraction.resolution = resolution;
    }
    if let Some(radius) = env_parse::<f32>("TOPO_RADIUS") {
        cfg.extraction.scan_radius = radius;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Save the config to disk, creating `~/.topo/` if necessary.
pub fn save(cfg: &Config) -> Result<(), TopoError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), TopoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| TopoError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                TopoError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TopoError::Config(format!("failed to serialize config: {e}")))?;
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
            .map_err(|e| {
                TopoError::Config(format!("failed to write config at {}: {e}", path.display()))
            })?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| {
        TopoError::Config(format!("failed to write config at {}: {e}", path.display()))
    })?;
    Ok(())
}
