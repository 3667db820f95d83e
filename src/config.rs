use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Base URL of the remote commerce API, e.g. "https://shop.example.com/api".
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
  /// Path to the local catalog YAML file. The bundled catalog is used when
  /// unset.
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Override for the cache database location.
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storesync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storesync/config.yaml
  /// 4. ~/.config/storesync/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/storesync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("storesync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storesync").join("config.yaml");
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

  /// Get the commerce API token from environment variables.
  ///
  /// Checks STORESYNC_API_TOKEN first, then STORE_API_TOKEN as fallback.
  pub fn api_token() -> Result<String> {
    std::env::var("STORESYNC_API_TOKEN")
      .or_else(|_| std::env::var("STORE_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Commerce API token not found. Set STORESYNC_API_TOKEN or STORE_API_TOKEN environment variable."
        )
      })
  }
}
