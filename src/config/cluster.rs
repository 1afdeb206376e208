use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Election namespace; independent elections may share one store
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,

    /// Prefix for generated holder ids. Falls back to `$HOSTNAME`.
    #[serde(default)]
    pub holder_id_prefix: Option<String>,

    /// Number of election agents this process runs against the cluster.
    /// Values above 1 are useful to simulate a fleet on a single host.
    #[serde(default = "default_local_agents")]
    pub local_agents: usize,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_id: default_cluster_id(),
            holder_id_prefix: None,
            local_agents: default_local_agents(),
            log_dir: default_log_dir(),
        }
    }
}

impl ClusterConfig {
    /// Validates cluster configuration consistency
    /// # Errors
    /// Returns `Error::InvalidConfig` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(Error::InvalidConfig("cluster_id cannot be empty".into()));
        }

        // ':' separates key segments in the store schema
        if self.cluster_id.contains(':') {
            return Err(Error::InvalidConfig(format!(
                "cluster_id {} must not contain ':'",
                self.cluster_id
            )));
        }

        if self.local_agents == 0 {
            return Err(Error::InvalidConfig("local_agents must be at least 1".into()));
        }

        Ok(())
    }
}

fn default_cluster_id() -> String {
    "default".to_string()
}
fn default_local_agents() -> usize {
    1
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
