//! Informer Error Hierarchy
//!
//! Defines the error types surfaced by the synchronization core, grouped by the
//! component that produces them: the delta queue, the cache layer and the
//! remote List+Watch source.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by external collaborators (List/Watch implementations).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Delta queue failures
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Key resolution and store failures
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Remote List+Watch source failures
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A run/start operation was invoked twice on the same instance
    #[error("{component} has already been started")]
    AlreadyStarted { component: &'static str },

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue stopped (or never accepts input again)
    #[error("delta fifo is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// The key function could not derive a key for an object
    #[error("Failed to compute object key: {reason}")]
    KeyFunc { reason: String },

    /// No object is cached under the key
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Backing store failures
    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("List request failed: {0}")]
    List(#[source] BoxError),

    #[error("Watch request failed: {0}")]
    Watch(#[source] BoxError),

    /// The watch stream ended without cancellation
    #[error("Watch stream closed unexpectedly")]
    WatchClosed,
}

impl Error {
    /// True when the error reports a stopped delta queue.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Queue(QueueError::Closed))
    }

    /// True when the error reports a missing cache entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Cache(CacheError::NotFound { .. }))
    }
}
