use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application configuration, persisted via confy under the `tokenlens` app name
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Warehouse connection settings. No credentials live here; the named
/// profile in connections.toml carries those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Profile name looked up in connections.toml
    pub profile: String,
    /// Optional override for the connections.toml location (supports `~`)
    pub connections_file: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            connections_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3170 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched usage table is served before re-querying
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Load config from the platform config directory, creating defaults on first run
pub fn load_config() -> Result<Config> {
    confy::load("tokenlens", None).context("Failed to load configuration")
}

/// Persist config back to the platform config directory
pub fn save_config(config: &Config) -> Result<()> {
    confy::store("tokenlens", None, config).context("Failed to save configuration")
}
