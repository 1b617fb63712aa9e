//! Application configuration for ExpoHarvest.
//!
//! User config lives at `~/.expoharvest/expoharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExpoHarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "expoharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".expoharvest";

// ---------------------------------------------------------------------------
// Config structs (matching expoharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Default settings for the JSON-API exhibitor source.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database file path (`~` expands to the home directory).
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Default number of runs returned by history queries.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Interval in ms between pause-flag polls while a job is suspended.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_limit: default_history_limit(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

fn default_db_path() -> String {
    "~/.expoharvest/expoharvest.db".into()
}
fn default_history_limit() -> u32 {
    20
}
fn default_pause_poll_ms() -> u64 {
    1000
}

/// `[source]` section — defaults for the JSON-API source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Minimum ms between page fetches from the same source.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            rate_limit_ms: default_rate_limit(),
        }
    }
}

fn default_page_size() -> u32 {
    25
}
fn default_rate_limit() -> u64 {
    200
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + caller input)
// ---------------------------------------------------------------------------

/// Which extractor source a job uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Paginated JSON endpoint fetched over HTTP.
    JsonApi,
    /// In-memory scripted source (tests and the CLI demo).
    Fixture,
}

/// Runtime extractor configuration passed into `start()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Source kind.
    pub source: SourceKind,
    /// Base URL of the JSON-API feed (required for `json-api`).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Records requested per page.
    pub page_size: u32,
    /// Minimum ms between page fetches.
    pub rate_limit_ms: u64,
}

impl ExtractorConfig {
    /// Config for a JSON-API source with `[source]` defaults applied.
    pub fn json_api(base_url: impl Into<String>, defaults: &SourceConfig) -> Self {
        Self {
            source: SourceKind::JsonApi,
            base_url: Some(base_url.into()),
            page_size: defaults.page_size,
            rate_limit_ms: defaults.rate_limit_ms,
        }
    }
}

/// Runtime engine tuning, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Polled wait interval while a job is paused.
    pub pause_poll: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pause_poll: Duration::from_millis(default_pause_poll_ms()),
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            pause_poll: Duration::from_millis(config.defaults.pause_poll_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.expoharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExpoHarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.expoharvest/expoharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExpoHarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ExpoHarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExpoHarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExpoHarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExpoHarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~` in a configured path to the home directory.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ExpoHarvestError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("db_path"));
        assert!(toml_str.contains("page_size"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.history_limit, 20);
        assert_eq!(parsed.defaults.pause_poll_ms, 1000);
        assert_eq!(parsed.source.page_size, 25);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
db_path = "/tmp/test.db"

[source]
page_size = 50
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.db_path, "/tmp/test.db");
        assert_eq!(config.defaults.pause_poll_ms, 1000);
        assert_eq!(config.source.page_size, 50);
        assert_eq!(config.source.rate_limit_ms, 200);
    }

    #[test]
    fn engine_config_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.pause_poll_ms = 50;
        let engine = EngineConfig::from(&app);
        assert_eq!(engine.pause_poll, Duration::from_millis(50));
    }

    #[test]
    fn extractor_config_json_api() {
        let app = AppConfig::default();
        let extractor = ExtractorConfig::json_api("https://expo.example.com/api", &app.source);
        assert_eq!(extractor.source, SourceKind::JsonApi);
        assert_eq!(extractor.page_size, 25);
        assert_eq!(
            extractor.base_url.as_deref(),
            Some("https://expo.example.com/api")
        );
    }

    #[test]
    fn expand_path_home_prefix() {
        let expanded = expand_path("~/.expoharvest/test.db").expect("expand");
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let absolute = expand_path("/tmp/test.db").expect("expand");
        assert_eq!(absolute, PathBuf::from("/tmp/test.db"));
    }
}
