//! Reads/writes `~/.airis/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use airis_memory::session_store::DEFAULT_SESSION_FILE;
use airis_middleware::DEFAULT_API_URL;

/// Persisted client configuration stored in `~/.airis/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the decision service's HTTP API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Directory the decision artifacts and voxel map are published to.
    /// Emptied at every start.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Reply timeout of the agent binding, in milliseconds.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,

    /// Where the id of the last ended session is kept for `--restore`.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_agent_timeout_ms() -> u64 {
    5_000
}
fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            output_dir: default_output_dir(),
            agent_timeout_ms: default_agent_timeout_ms(),
            session_file: default_session_file(),
        }
    }
}

impl Config {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

/// Return the path to `~/.airis/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".airis").join("config.toml")
}

/// Load the config from disk and apply env overrides.  A missing file
/// yields the defaults.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `AIRIS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `AIRIS_API_URL` | `api_url` |
/// | `AIRIS_OUTPUT_DIR` | `output_dir` |
/// | `AIRIS_AGENT_TIMEOUT_MS` | `agent_timeout_ms` |
/// | `AIRIS_SESSION_FILE` | `session_file` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("AIRIS_API_URL") {
        cfg.api_url = v;
    }
    if let Ok(v) = std::env::var("AIRIS_OUTPUT_DIR") {
        cfg.output_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("AIRIS_AGENT_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.agent_timeout_ms = ms;
        }
    if let Ok(v) = std::env::var("AIRIS_SESSION_FILE") {
        cfg.session_file = PathBuf::from(v);
    }
}

/// Save the config to disk, creating `~/.airis/` if necessary.
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
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
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
