//! Error types for untar_light.
//!
//! Every fallible operation returns [`Result<T>`], an alias for
//! `Result<T, UntarError>`. Decode errors are fatal to the whole archive:
//! a record's length decides where the next record starts, so nothing after a
//! malformed record can be trusted.

/// Result type alias for operations that may return an [`UntarError`].
pub type Result<T> = std::result::Result<T, UntarError>;

/// Error types for decode operations.
#[derive(Debug, thiserror::Error)]
pub enum UntarError {
    /// Malformed PAX record or an unreadable numeric header field.
    #[error("invalid tar data at offset {offset}: {reason}")]
    Format {
        /// Byte offset into the archive where the bad data starts.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A header or its content runs past the end of the buffer.
    #[error("truncated archive at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The decode failed on the worker thread.
    #[error("untar worker: {0}")]
    Worker(String),

    /// The worker thread is no longer running.
    #[error("untar worker is not running")]
    Disconnected,

    /// I/O error while reading an archive from disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UntarError {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        UntarError::Format {
            offset,
            reason: reason.into(),
        }
    }
}
