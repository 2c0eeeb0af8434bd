use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Identity signed in at startup; absent means signed out
  pub user_id: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Records requested per page
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Quiet period after the last keystroke before a search reloads
  #[serde(default = "default_search_debounce_ms")]
  pub search_debounce_ms: u64,
  /// Lookahead before the end of the list at which more pages load
  #[serde(default = "default_scroll_margin_px")]
  pub scroll_margin_px: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the saved-pages API
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  /// Database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
  #[serde(default = "default_key_prefix")]
  pub key_prefix: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: default_ttl_secs(),
      path: None,
      key_prefix: default_key_prefix(),
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

fn default_true() -> bool {
  true
}

fn default_ttl_secs() -> u64 {
  300
}

fn default_key_prefix() -> String {
  "savedPages_cache".to_string()
}

fn default_page_size() -> u32 {
  50
}

fn default_search_debounce_ms() -> u64 {
  300
}

fn default_scroll_margin_px() -> u32 {
  200
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pageshelf.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pageshelf/config.yaml
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
        "No configuration file found. Create one at ~/.config/pageshelf/config.yaml\n\
                 with at least `api: {{ url: ... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pageshelf.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pageshelf").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }
    Ok(config)
  }

  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks PAGESHELF_TOKEN first, then PAGESHELF_API_TOKEN as fallback.
  /// The API may be open, so a missing token is not an error.
  pub fn get_api_token() -> Option<String> {
    std::env::var("PAGESHELF_TOKEN")
      .or_else(|_| std::env::var("PAGESHELF_API_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }

  /// Directory for the cache database and log file.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pageshelf"))
  }
}
