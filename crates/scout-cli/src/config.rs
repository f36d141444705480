//! Configuration vault – reads/writes `~/.scout/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.scout/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Memory database and processed datasets live here.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Holds `sources.toml` and `methodologies.toml`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Crawl exports, one `<source>.json` per source.
    #[serde(default = "default_feeds_dir")]
    pub feeds_dir: PathBuf,

    /// Methodology used by `/research` when none is given.
    #[serde(default = "default_research_type")]
    pub default_research_type: String,

    #[serde(default = "default_use_learning")]
    pub use_learning: bool,

    #[serde(default = "default_limit_per_source")]
    pub limit_per_source: usize,

    /// Age in days after which `/cleanup` archives projects.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn scout_home() -> PathBuf {
    scout_home_for(&home_dir())
}

fn scout_home_for(home: &str) -> PathBuf {
    PathBuf::from(home).join(".scout")
}

fn default_data_dir() -> PathBuf {
    scout_home().join("data")
}
fn default_config_dir() -> PathBuf {
    scout_home().join("config")
}
fn default_feeds_dir() -> PathBuf {
    scout_home().join("feeds")
}
fn default_research_type() -> String {
    "technology_analysis".to_string()
}
fn default_use_learning() -> bool {
    true
}
fn default_limit_per_source() -> usize {
    15
}
fn default_retention_days() -> u32 {
    90
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            config_dir: default_config_dir(),
            feeds_dir: default_feeds_dir(),
            default_research_type: default_research_type(),
            use_learning: default_use_learning(),
            limit_per_source: default_limit_per_source(),
            retention_days: default_retention_days(),
        }
    }
}

/// Return the path to `~/.scout/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    scout_home_for(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SCOUT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SCOUT_DATA_DIR` | `data_dir` |
/// | `SCOUT_CONFIG_DIR` | `config_dir` |
/// | `SCOUT_FEEDS_DIR` | `feeds_dir` |
/// | `SCOUT_RESEARCH_TYPE` | `default_research_type` |
/// | `SCOUT_LIMIT_PER_SOURCE` | `limit_per_source` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SCOUT_DATA_DIR") {
        cfg.data_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SCOUT_CONFIG_DIR") {
        cfg.config_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SCOUT_FEEDS_DIR") {
        cfg.feeds_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("SCOUT_RESEARCH_TYPE") {
        cfg.default_research_type = v;
    }
    if let Ok(v) = std::env::var("SCOUT_LIMIT_PER_SOURCE")
        && let Ok(n) = v.parse::<usize>()
        && n > 0
    {
        cfg.limit_per_source = n;
    }
}

/// Save the config to disk, creating `~/.scout/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
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
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
