//! Layered server configuration: built-in defaults, then an optional TOML
//! file, then `NARRATIVELOG_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use narrativelog_core::message::SITE_ID_LEN;
use narrativelog_store_sqlite::DEFAULT_READ_CONNECTIONS;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "NARRATIVELOG";

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  pub site_id:          String,
  /// Connections serving `get`/`find` alongside the single writer.
  pub read_connections: usize,
}

impl ServerConfig {
  /// Read configuration from `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "narrativelog.db")?
      .set_default("read_connections", DEFAULT_READ_CONNECTIONS as u64)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    ensure!(!self.site_id.trim().is_empty(), "site_id must not be empty");
    ensure!(
      self.site_id.chars().count() <= SITE_ID_LEN,
      "site_id {:?} is longer than {SITE_ID_LEN} characters",
      self.site_id
    );
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
