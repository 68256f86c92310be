//! Error types for AMI operations

use crate::protocol::ErrorResponse;

/// Result alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors returned by the AMI engine and client.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AmiError {
    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The client is no longer connected.
    #[error("not connected")]
    NotConnected,

    /// The caller's cancellation fired while waiting on the transport.
    #[error("operation cancelled")]
    Cancelled,

    /// A bounded wait expired.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// An action was built without a name. Nothing was sent.
    #[error("invalid Action")]
    InvalidAction,

    /// An action field name or value cannot be written as one wire line.
    #[error("invalid field {name:?}: {reason}")]
    InvalidField { name: String, reason: String },

    /// A structured payload could not be rendered into fields.
    #[error("field encoding failed: {0}")]
    Encode(String),

    /// The switch answered with `Response: Error`.
    #[error("{0}")]
    Protocol(Box<ErrorResponse>),

    /// The byte stream violated AMI framing.
    #[error("protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// Buffered input exceeded the configured limit without a frame terminator.
    #[error("frame too large: {size} bytes buffered, limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// The first line from the peer was not an AMI greeting.
    #[error("unexpected banner: {banner:?}")]
    UnexpectedBanner { banner: String },

    /// Login was rejected.
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// Events were dropped because the application did not drain the stream.
    #[error("event queue full, events dropped")]
    QueueFull,

    /// The reader task stopped while this waiter was pending.
    #[error("reader task ended before a matching frame arrived")]
    WaiterClosed,
}

impl AmiError {
    /// Framing violation with a message.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Login rejection with a reason.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    /// The error response carried by a `Protocol` error.
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Protocol(resp) => Some(resp),
            _ => None,
        }
    }

    /// Whether this error ends the connection rather than one request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::ProtocolViolation { .. }
                | Self::FrameTooLarge { .. }
                | Self::WaiterClosed
        )
    }
}

impl From<ErrorResponse> for AmiError {
    fn from(resp: ErrorResponse) -> Self {
        Self::Protocol(Box::new(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_action_message() {
        assert_eq!(AmiError::InvalidAction.to_string(), "invalid Action");
    }

    #[test]
    fn connection_errors_classified() {
        assert!(AmiError::ConnectionClosed.is_connection_error());
        assert!(AmiError::protocol_violation("x").is_connection_error());
        assert!(!AmiError::Cancelled.is_connection_error());
        assert!(!AmiError::InvalidAction.is_connection_error());
    }

    #[test]
    fn io_error_converts() {
        let err: AmiError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, AmiError::Io(_)));
        assert!(err
            .to_string()
            .contains("gone"));
    }
}
