//! Error types for AGI sessions and the FastAGI server

/// Convenience result alias used throughout the crate.
pub type AgiResult<T> = Result<T, AgiError>;

/// Errors returned by AGI sessions and the FastAGI server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AgiError {
    /// I/O failure on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The listening socket could not be created.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the server attempted to listen on.
        addr: String,
        /// Underlying bind failure.
        source: std::io::Error,
    },

    /// The accept loop failed for a reason other than an intentional stop.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// An environment header line lacked the `key: value` separator.
    #[error("invalid environment line: {line}")]
    MalformedEnvironment {
        /// The offending line, verbatim.
        line: String,
    },

    /// A reply line did not start with the `200` success marker.
    #[error("invalid response: {line}")]
    InvalidResponse {
        /// The offending line, verbatim.
        line: String,
    },

    /// A reply line carried a result code that did not parse as an integer.
    #[error("unparseable result code: {line}")]
    UnparseableResult {
        /// The offending line, verbatim.
        line: String,
    },

    /// A command string failed validation before being sent.
    #[error("invalid command: {message}")]
    CommandInvalid {
        /// What was wrong with the command.
        message: String,
    },

    /// No reply arrived within the session's per-operation timeout.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that expired, in milliseconds.
        timeout_ms: u64,
    },

    /// A protocol line exceeded the maximum accepted length.
    #[error("protocol line exceeds {limit} bytes")]
    LineTooLong {
        /// The enforced limit, in bytes.
        limit: usize,
    },

    /// The peer closed the connection (EOF on read).
    #[error("connection closed")]
    ConnectionClosed,

    /// `execute` was called on a session that has been closed.
    #[error("session is closed")]
    SessionClosed,
}

impl AgiError {
    /// Build a [`AgiError::CommandInvalid`] from any message.
    pub fn command_invalid(message: impl Into<String>) -> Self {
        AgiError::CommandInvalid {
            message: message.into(),
        }
    }

    /// `true` for errors that leave the transport unusable (the session
    /// may be desynchronized and should be closed, not retried).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AgiError::CommandInvalid { .. })
    }
}
