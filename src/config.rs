use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::SearchSettings;
use crate::storage::DEFAULT_QUOTA_BYTES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub search: SearchConfig,
  /// Categories cycled with Tab; empty string is the unscoped listing
  #[serde(default = "default_categories")]
  pub categories: Vec<String>,
}

fn default_categories() -> Vec<String> {
  vec![String::new()]
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      storage: StorageConfig::default(),
      cache: CacheConfig::default(),
      search: SearchConfig::default(),
      categories: default_categories(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the catalog API (e.g., "https://shop.example.com/api/")
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:5000/api/".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// SQLite file; defaults to $XDG_DATA_HOME/shopcache/storage.db
  pub path: Option<PathBuf>,
  #[serde(default = "default_quota")]
  pub quota_bytes: usize,
}

fn default_quota() -> usize {
  DEFAULT_QUOTA_BYTES
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      path: None,
      quota_bytes: DEFAULT_QUOTA_BYTES,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Treat snapshots older than this as absent. Unset keeps them forever.
  pub max_age_secs: Option<u64>,
  /// How long the "loaded from cache" notice stays up
  #[serde(default = "default_notice_secs")]
  pub notice_secs: u64,
  /// Items shown by the grid layout
  #[serde(default = "default_grid_size")]
  pub grid_size: usize,
}

fn default_notice_secs() -> u64 {
  3
}

fn default_grid_size() -> usize {
  8
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_age_secs: None,
      notice_secs: default_notice_secs(),
      grid_size: default_grid_size(),
    }
  }
}

impl CacheConfig {
  pub fn max_age(&self) -> Option<chrono::Duration> {
    self
      .max_age_secs
      .and_then(|secs| chrono::Duration::try_seconds(i64::try_from(secs).ok()?))
  }

  pub fn notice_duration(&self) -> Duration {
    Duration::from_secs(self.notice_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
  #[serde(default = "default_min_chars")]
  pub min_chars: usize,
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  #[serde(default = "default_max_results")]
  pub max_results: usize,
}

fn default_min_chars() -> usize {
  2
}

fn default_debounce_ms() -> u64 {
  250
}

fn default_max_results() -> usize {
  8
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      min_chars: default_min_chars(),
      debounce_ms: default_debounce_ms(),
      max_results: default_max_results(),
    }
  }
}

impl From<&SearchConfig> for SearchSettings {
  fn from(config: &SearchConfig) -> Self {
    Self {
      min_chars: config.min_chars,
      delay: Duration::from_millis(config.debounce_ms),
      max_results: config.max_results,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shopcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shopcache/config.yaml
  ///
  /// Without any file the defaults are used.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shopcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shopcache").join("config.yaml");
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
    let mut config: Config = serde_yaml::from_str(contents)?;
    if config.categories.is_empty() {
      config.categories = default_categories();
    }
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_file_fills_defaults() {
    let config = Config::parse("api:\n  base_url: https://shop.test/api/\n").unwrap();
    assert_eq!(config.api.base_url, "https://shop.test/api/");
    assert_eq!(config.search.min_chars, 2);
    assert_eq!(config.search.debounce_ms, 250);
    assert_eq!(config.cache.notice_secs, 3);
    assert_eq!(config.cache.max_age(), None);
    assert_eq!(config.storage.quota_bytes, DEFAULT_QUOTA_BYTES);
    assert_eq!(config.categories, vec![String::new()]);
  }

  #[test]
  fn test_full_file() {
    let yaml = r#"
api:
  base_url: https://shop.test/api/
storage:
  path: /tmp/shop.db
  quota_bytes: 1024
cache:
  max_age_secs: 600
  notice_secs: 5
  grid_size: 4
search:
  min_chars: 3
  debounce_ms: 400
  max_results: 5
categories: ["", "shirts", "sarees"]
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.storage.path.as_deref(), Some(Path::new("/tmp/shop.db")));
    assert_eq!(config.cache.max_age(), Some(chrono::Duration::minutes(10)));
    assert_eq!(config.cache.grid_size, 4);
    assert_eq!(config.categories.len(), 3);

    let settings = SearchSettings::from(&config.search);
    assert_eq!(settings.min_chars, 3);
    assert_eq!(settings.delay, Duration::from_millis(400));
    assert_eq!(settings.max_results, 5);
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }

  #[test]
  fn test_default_matches_empty_file() {
    let config = Config::default();
    assert_eq!(config.categories, vec![String::new()]);
    let parsed = Config::parse("{}").unwrap();
    assert_eq!(parsed.categories, config.categories);
    assert_eq!(parsed.api.base_url, config.api.base_url);
  }

  #[test]
  fn test_empty_categories_fall_back_to_all() {
    let config = Config::parse("categories: []\n").unwrap();
    assert_eq!(config.categories, vec![String::new()]);
  }
}
