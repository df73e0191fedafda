//! Configuration for the policy engine

use crate::error::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Hostname used when nothing else provides one
    #[serde(default = "default_fallback_hostname")]
    pub fallback_hostname: String,
    /// DHCP option consulted for an automatically supplied hostname
    #[serde(default = "default_dhcp_hostname_option")]
    pub dhcp_hostname_option: String,
}

fn default_fallback_hostname() -> String {
    "localhost.localdomain".to_string()
}

fn default_dhcp_hostname_option() -> String {
    "host_name".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fallback_hostname: default_fallback_hostname(),
            dhcp_hostname_option: default_dhcp_hostname_option(),
        }
    }
}

impl PolicyConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PolicyError::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| PolicyError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PolicyResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PolicyError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| PolicyError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
