//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <PATH>` on the command line
//! 2. `$INBOXRULES_CONFIG` (environment variable)
//! 3. `~/.config/inboxrules/config.toml` (Linux)
//!    `%APPDATA%\inboxrules\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ingest::{IngestOptions, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_MESSAGE_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub rules: RulesConfig,
    pub store: StoreConfig,
    pub mailbox: MailboxConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the data directory (record store, mailbox state).
    pub data_dir: Option<PathBuf>,
    /// Override the cache directory (logs).
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule document. Relative paths resolve against the working directory.
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Record store file (default: `<data_dir>/records.db`).
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Local mailbox state (default: `<data_dir>/mailbox.json`).
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Messages taken per ingest (0 = unlimited).
    pub max_messages: usize,
    /// Per-message size limit in bytes (default: 33554432 = 32 MB).
    pub max_message_size: usize,
    /// Only ingest messages carrying this label.
    pub label_filter: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
            cache_dir: None,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("rules.json"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            label_filter: None,
        }
    }
}

impl IngestConfig {
    pub fn to_options(&self) -> IngestOptions {
        IngestOptions {
            max_messages: self.max_messages,
            label_filter: self.label_filter.clone(),
            max_message_size: self.max_message_size,
        }
    }
}

/// Load configuration from `explicit` or the standard location.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => config_file_path(),
    };
    match path {
        Some(path) if path.exists() => load_config_from(&path).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            Config::default()
        }),
        _ => Config::default(),
    }
}

/// Read and parse a config file.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<Config>(&contents)?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("INBOXRULES_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("inboxrules").join("config.toml"))
}

/// Directory for the record store and mailbox state.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inboxrules")
}

/// Directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inboxrules")
}

pub fn rules_path(config: &Config) -> PathBuf {
    config.rules.file.clone()
}

pub fn store_path(config: &Config) -> PathBuf {
    config
        .store
        .path
        .clone()
        .unwrap_or_else(|| data_dir(config).join("records.db"))
}

pub fn mailbox_path(config: &Config) -> PathBuf {
    config
        .mailbox
        .state_file
        .clone()
        .unwrap_or_else(|| data_dir(config).join("mailbox.json"))
}

pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("inboxrules.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.rules.file, PathBuf::from("rules.json"));
        assert_eq!(cfg.ingest.max_messages, 50);
        assert!(cfg.store.path.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.ingest.label_filter = Some("INBOX".into());
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.ingest.label_filter.as_deref(), Some("INBOX"));
        assert_eq!(parsed.ingest.max_message_size, cfg.ingest.max_message_size);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[general]
data_dir = "/tmp/inboxrules-test"

[ingest]
max_messages = 0
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.ingest.max_messages, 0);
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(
            store_path(&cfg),
            PathBuf::from("/tmp/inboxrules-test/records.db")
        );
        assert_eq!(
            mailbox_path(&cfg),
            PathBuf::from("/tmp/inboxrules-test/mailbox.json")
        );
        assert_eq!(rules_path(&cfg), PathBuf::from("rules.json"));
    }

    #[test]
    fn test_log_file_lives_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/inboxrules-cache"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/inboxrules-cache/inboxrules.log")
        );
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");
        let mut cfg = Config::default();
        cfg.general.log_level = "debug".into();
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(Some(&path));
        assert_eq!(loaded.general.log_level, "debug");
    }

    #[test]
    fn test_broken_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general\nlog_level = ").unwrap();
        assert!(load_config_from(&path).is_err());
        assert_eq!(load_config(Some(&path)).general.log_level, "warn");
    }
}
