//! Error taxonomy for the session layer.
//!
//! Two families, split by where they surface:
//!   SessionError: caller bugs and misconfiguration, returned at the call site
//!   WriteError: runtime failures, delivered through a WriteFuture

use std::sync::Arc;

use thiserror::Error;

/// Rejected synchronously at the call boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("message is empty, nothing to write")]
    EmptyMessage,
    #[error("destination address given on a connection-oriented transport")]
    UnsupportedDestination,
    #[error("read operation is not enabled for this session")]
    ReadOperationDisabled,
}

/// Failure carried by a completed WriteFuture.
///
/// Cloneable so every listener of a future observes the same error.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    #[error("write to closed session")]
    ClosedSession,
    #[error("write timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("failed to prepare payload: {0}")]
    Io(Arc<std::io::Error>),
}

impl WriteError {
    pub fn is_closed_session(&self) -> bool {
        matches!(self, WriteError::ClosedSession)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WriteError::Timeout { .. })
    }
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        WriteError::Io(Arc::new(e))
    }
}

/// Failure delivered to a reader through a ReadFuture.
pub type ReadFailure = Arc<dyn std::error::Error + Send + Sync + 'static>;
