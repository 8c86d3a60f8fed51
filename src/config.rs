use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Server that relative resource paths (e.g. `episodes.json`) resolve against
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub transport: TransportConfig,
  #[serde(default)]
  pub log: LogConfig,
}

fn default_base_url() -> String {
  "http://localhost:8000".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      cache: CacheConfig::default(),
      transport: TransportConfig::default(),
      log: LogConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Single SQLite database file
  #[default]
  Sqlite,
  /// One file per cached response
  Files,
  /// Process memory only
  Memory,
  /// Caching disabled
  None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// Database file (sqlite) or directory (files). Defaults under the data dir.
  pub path: Option<PathBuf>,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
  pub timeout_secs: u64,
  pub user_agent: String,
  /// Bearer token. Never read from the file; filled from the environment.
  #[serde(skip)]
  pub auth_token: Option<String>,
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 30,
      user_agent: concat!("readthru/", env!("CARGO_PKG_VERSION")).to_string(),
      auth_token: None,
    }
  }
}

impl fmt::Debug for TransportConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TransportConfig")
      .field("timeout_secs", &self.timeout_secs)
      .field("user_agent", &self.user_agent)
      .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive, overridden by RUST_LOG
  pub level: String,
  /// Log to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./readthru.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/readthru/config.yaml
  ///
  /// Falls back to defaults when no file exists. The auth token is taken
  /// from the environment either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.transport.auth_token = Self::get_auth_token();

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("readthru.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("readthru").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid "all defaults" config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }

    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the bearer token from the environment.
  ///
  /// Checks READTHRU_AUTH_TOKEN. Empty values count as unset.
  pub fn get_auth_token() -> Option<String> {
    std::env::var("READTHRU_AUTH_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.base_url, "http://localhost:8000");
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
    assert_eq!(config.transport.timeout_secs, 30);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_partial_sections_fill_defaults() {
    let config = Config::parse(
      "base_url: https://api.example.com\n\
       cache:\n  backend: files\n  path: /tmp/responses\n\
       transport:\n  timeout_secs: 5\n",
    )
    .unwrap();

    assert_eq!(config.base_url, "https://api.example.com");
    assert_eq!(config.cache.backend, CacheBackend::Files);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/responses")));
    assert_eq!(config.transport.timeout_secs, 5);
    assert!(config.transport.user_agent.starts_with("readthru/"));
  }

  #[test]
  fn test_auth_token_is_not_read_from_file() {
    let config = Config::parse("transport:\n  auth_token: leaked\n").unwrap();
    assert_eq!(config.transport.auth_token, None);
  }

  #[test]
  fn test_unknown_backend_is_rejected() {
    assert!(Config::parse("cache:\n  backend: redis\n").is_err());
  }

  #[test]
  fn test_token_is_redacted_in_debug() {
    let transport = TransportConfig {
      auth_token: Some("secret".to_string()),
      ..TransportConfig::default()
    };
    let printed = format!("{:?}", transport);
    assert!(!printed.contains("secret"));
    assert!(printed.contains("<redacted>"));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "cache:\n  backend: none\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.cache.backend, CacheBackend::None);
  }
}
