//! Leader Election Error Hierarchy
//!
//! Defines the error types surfaced by the election service, categorized by
//! the layer that produced them. Contention outcomes (a lease held by someone
//! else, a renewal rejected because the caller was deposed) are *not* errors;
//! they are modelled as [`AcquireOutcome`](crate::AcquireOutcome) and
//! [`RenewOutcome`](crate::RenewOutcome) variants and drive role transitions.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (lease store, notification channel, io)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Election protocol violations
    #[error(transparent)]
    Election(#[from] ElectionError),

    /// Invariant broken beyond recovery; the agent stops
    #[error("fatal: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Lease store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Join on spawned task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    #[error("Election node could not start: {0}")]
    NodeStartFailed(String),

    #[error("{0}")]
    SignalSenderClosed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store endpoint unreachable or refusing calls
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single store call exceeded its budget
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// Backend specific failure
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Persisted record could not be encoded or decoded
    #[error("Record serialization failed: {0}")]
    Serialization(String),

    /// The fencing counter for a cluster can not be advanced any further
    #[error("Fencing tokens exhausted for cluster {0}")]
    FencingExhausted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Event encoding failed: {0}")]
    Encode(String),

    #[error("Event decoding failed: {0}")]
    Decode(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    /// An action was tagged with a token older than one already observed
    #[error("Stale fencing token {presented} (highest observed: {highest})")]
    StaleFencingToken { presented: u64, highest: u64 },

    /// Operation requires the local node to hold the lease
    #[error("Node {holder_id} is not leader of cluster {cluster_id}")]
    NotLeader { cluster_id: String, holder_id: String },

    /// Backoff gave up on a store operation
    #[error("Retry budget exhausted after {attempts} attempts")]
    RetryBudgetExhausted { attempts: usize },

    /// The agent task is gone and can not accept commands
    #[error("Election agent for cluster {0} has stopped")]
    AgentStopped(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::System(SystemError::Store(e))
    }
}

impl From<NotificationError> for Error {
    fn from(e: NotificationError) -> Self {
        Error::System(SystemError::Notification(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Error::System(SystemError::TaskFailed(e))
    }
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        StoreError::from(e).into()
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl Error {
    /// Transient infrastructure failures are retried by the election agent
    /// instead of being surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::System(SystemError::Store(
                StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::Backend(_)
            )) | Error::System(SystemError::Notification(_))
                | Error::System(SystemError::Timeout(_))
        )
    }
}
