use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the site backend (e.g. "https://api.example.com/")
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Fallback TTL in seconds for resources without an override
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,
  /// Per-resource TTL overrides in seconds, keyed by resource name.
  /// Categories change rarely and get a longer window than banners.
  #[serde(default = "default_ttl_overrides")]
  pub ttl_overrides: HashMap<String, u64>,
}

fn default_ttl_secs() -> u64 {
  300
}

fn default_ttl_overrides() -> HashMap<String, u64> {
  HashMap::from([("categories".to_string(), 600), ("banners".to_string(), 300)])
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: default_ttl_secs(),
      ttl_overrides: default_ttl_overrides(),
    }
  }
}

impl CacheConfig {
  /// Resolve the TTL for a named resource.
  pub fn ttl_for(&self, resource: &str) -> Duration {
    let secs = self
      .ttl_overrides
      .get(resource)
      .copied()
      .unwrap_or(self.default_ttl_secs);
    Duration::from_secs(secs)
  }
}

impl Config {
  /// Build a configuration directly from a backend URL with default TTLs.
  pub fn from_url(url: impl Into<String>) -> Self {
    Self {
      api: ApiConfig { url: url.into() },
      cache: CacheConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./addeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/addeck/config.yaml
  /// 4. ~/.config/addeck/config.yaml
  ///
  /// The ADDECK_API_URL environment variable overrides the file's api.url.
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
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/addeck/config.yaml\n\
                 or set ADDECK_API_URL and use Config::from_url."
        ))
      }
    };

    if let Ok(url) = std::env::var("ADDECK_API_URL") {
      config.api.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("addeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("addeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ttl_override_wins() {
    let cache = CacheConfig::default();
    assert_eq!(cache.ttl_for("categories"), Duration::from_secs(600));
    assert_eq!(cache.ttl_for("banners"), Duration::from_secs(300));
  }

  #[test]
  fn test_default_ttl_for_unknown_resource() {
    let cache = CacheConfig::default();
    assert_eq!(cache.ttl_for("profiles"), Duration::from_secs(300));
  }

  #[test]
  fn test_parse_minimal_yaml() {
    let config: Config = serde_yaml::from_str("api:\n  url: http://localhost:8000/\n").unwrap();
    assert_eq!(config.api.url, "http://localhost:8000/");
    assert_eq!(config.cache.default_ttl_secs, 300);
  }
}
