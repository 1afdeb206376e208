use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Operational HTTP surface (leader query, status, metrics)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Expose prometheus metrics on `/metrics`
    #[serde(default = "default_prometheus_enabled")]
    pub prometheus_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            port: default_api_port(),
            prometheus_enabled: default_prometheus_enabled(),
        }
    }
}

impl ApiConfig {
    /// Validates api configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when the server is enabled with an
    /// unusable port
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            if self.port == 0 {
                return Err(Error::InvalidConfig("port cannot be 0 when enabled".into()));
            }

            // Check privileged ports (requires root)
            if self.port < 1024 {
                return Err(Error::InvalidConfig(format!(
                    "port {} is a privileged port (requires root)",
                    self.port
                )));
            }
        }

        Ok(())
    }
}

fn default_api_enabled() -> bool {
    true
}
fn default_api_port() -> u16 {
    8080
}
fn default_prometheus_enabled() -> bool {
    true
}
