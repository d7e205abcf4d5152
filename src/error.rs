//! Error taxonomy for a churn run
//!
//! Configuration problems and allocation failures end the whole run. A
//! panicking worker only takes itself down; the pool logs it and carries on.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the worker pool and the coordinator
#[derive(Debug, Error)]
pub enum ChurnError {
    /// Invalid or missing configuration, detected before any worker starts
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A buffer could not be allocated
    #[error("worker {worker}: failed to allocate {bytes} byte buffer")]
    ResourceExhausted { worker: usize, bytes: usize },

    /// Workers did not stop within the caller-supplied bound
    #[error("workers did not stop within {0:?}")]
    JoinTimeout(Duration),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

impl ChurnError {
    /// True for errors that fail the whole run rather than a single worker
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ChurnError::WorkerPanicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ChurnError::Config("bucket_capacity".into()).is_fatal());
        assert!(ChurnError::ResourceExhausted { worker: 0, bytes: 4096 }.is_fatal());
        assert!(ChurnError::JoinTimeout(Duration::from_secs(1)).is_fatal());
        assert!(ChurnError::Spawn {
            worker: 1,
            source: io::Error::new(io::ErrorKind::Other, "no threads"),
        }
        .is_fatal());
        assert!(!ChurnError::WorkerPanicked(3).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ChurnError::ResourceExhausted { worker: 2, bytes: 65536 };
        assert_eq!(err.to_string(), "worker 2: failed to allocate 65536 byte buffer");
    }
}
