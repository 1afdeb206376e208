//! Configuration management for the election service.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. `config/default` file (optional)
//! 3. Explicit config file (argument or `CONFIG_PATH`)
//! 4. `config/local` overrides (optional)
//! 5. Environment variables with `ELECT__` prefix (highest priority)
//!
//! Election timing loaded here only seeds the node. Runtime changes of
//! `leaseTTL`, `renewalIntervalFraction` and the jitter bounds arrive through
//! the [`ConfigWatcher`](crate::ConfigWatcher).

mod api;
mod cluster;
mod election;
mod notification;
mod retry;
mod store;
mod watcher;
pub use api::*;
pub use cluster::*;
pub use election::*;
pub use notification::*;
pub use retry::*;
pub use store::*;
pub use watcher::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Election namespace and local agent layout
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Lease timing parameters
    #[serde(default)]
    pub election: ElectionConfig,
    /// Lease store backend
    #[serde(default)]
    pub store: StoreConfig,
    /// Leadership notification fan-out
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Runtime parameter source
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Operational HTTP surface
    #[serde(default)]
    pub api: ApiConfig,
    /// Retry policies for store and channel operations
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration from all sources and validate the merged result.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a node specific configuration file
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder()
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        } else if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ELECT")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        self.election.validate()?;
        self.store.validate()?;
        self.notification.validate()?;
        self.watcher.validate()?;
        self.api.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}
