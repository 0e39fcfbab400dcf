//! Server configuration, read from a TOML file layered with `STOCKROOM_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use stockroom_core::inventory::DEFAULT_LOCATION;
use stockroom_store_sqlite::DEFAULT_HOLD_TTL_SECS;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// Location assumed for order lines that do not name one.
  #[serde(default = "default_location")]
  pub default_location: String,
  /// Seconds an unfinished checkout keeps its reservations before
  /// reconciliation may reclaim them.
  #[serde(default = "default_hold_ttl_secs")]
  pub hold_ttl_secs:    i64,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("stockroom.db") }

fn default_location() -> String { DEFAULT_LOCATION.to_owned() }

fn default_hold_ttl_secs() -> i64 { DEFAULT_HOLD_TTL_SECS }

impl ServerConfig {
  /// Load `path` (optional) and overlay `STOCKROOM_*` variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("STOCKROOM"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  /// The store path with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
