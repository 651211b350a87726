use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::autocomplete::DEFAULT_LIMIT;
use crate::table::RenderOptions;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct McpConfig {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SearchSection {
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub batch_lookups: bool,
    pub autocomplete_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ServerSection {
    pub addr: Option<String>,
}

impl McpConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            batch_lookups: self.search.batch_lookups,
        }
    }

    pub fn autocomplete_limit(&self) -> usize {
        self.search.autocomplete_limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Resolve the listen address: env MCPSEARCH_ADDR > config > DEFAULT_ADDR.
    pub fn addr(&self) -> Result<SocketAddr> {
        self.addr_with_lookup(|key| env::var(key).ok())
    }

    fn addr_with_lookup<F>(&self, lookup_env: F) -> Result<SocketAddr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup_env("MCPSEARCH_ADDR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| self.server.addr.clone())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        raw.parse()
            .with_context(|| format!("invalid listen address `{raw}`"))
    }
}

/// Load and parse the config from a TOML file. Returns default if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<McpConfig> {
    if !config_path.exists() {
        return Ok(McpConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: McpConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
