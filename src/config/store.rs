use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; every agent of this process shares it
    Memory,
    /// Durable sled database; fencing counters survive restarts
    Sled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == StoreBackend::Sled && self.db_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("db_path is required for the sled backend".into()));
        }
        Ok(())
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./db/leases")
}
