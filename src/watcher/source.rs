use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use config::Config;
use config::File;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::Result;

/// External key/value source of election parameters.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    /// Current key/value pairs; absent keys are simply missing
    async fn fetch(&self) -> Result<HashMap<String, String>>;

    /// Resolves when the source pushes a change. Sources that can only be
    /// polled never resolve.
    async fn changed(&self);
}

/// Re-reads a file on every poll, in any format the `config` crate parses.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> Result<HashMap<String, String>> {
        let values = Config::builder()
            .add_source(File::from(self.path.as_path()).required(true))
            .build()?
            .try_deserialize::<HashMap<String, String>>()?;
        Ok(values)
    }

    async fn changed(&self) {
        std::future::pending::<()>().await
    }
}

/// Push-delivered source held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    values: Arc<RwLock<HashMap<String, String>>>,
    notify: Arc<Notify>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        key: &str,
        value: impl ToString,
    ) {
        self.values.write().insert(key.to_string(), value.to_string());
        self.notify.notify_one();
    }

    pub fn remove(
        &self,
        key: &str,
    ) {
        self.values.write().remove(key);
        self.notify.notify_one();
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn fetch(&self) -> Result<HashMap<String, String>> {
        Ok(self.values.read().clone())
    }

    async fn changed(&self) {
        self.notify.notified().await
    }
}
