//! Daemon configuration (TOML), located through `RESULTSD_CONFIG`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::snapshot::Backend;

pub const CONFIG_ENV: &str = "RESULTSD_CONFIG";

/// Missing fields fall back to the in-memory demo setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortalConfig {
    /// Workspace opened at startup. Without one the store is memory-only.
    pub workspace: Option<PathBuf>,

    /// Snapshot format used for workspaces.
    pub backend: Backend,

    /// Seed the demo accounts and subjects into a store with no users.
    pub seed_demo: bool,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            backend: Backend::Csv,
            seed_demo: true,
            log_filter: None,
        }
    }
}

impl PortalConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ws) = &self.workspace {
            if ws.as_os_str().is_empty() {
                return Err(anyhow!("workspace must not be empty"));
            }
        }
        if let Some(f) = &self.log_filter {
            if f.trim().is_empty() {
                return Err(anyhow!("log_filter must not be blank"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<PortalConfig> {
    if !path.exists() {
        return Ok(PortalConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    let cfg: PortalConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_env() -> anyhow::Result<PortalConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(p) => load_config(Path::new(&p)),
        None => Ok(PortalConfig::default()),
    }
}
