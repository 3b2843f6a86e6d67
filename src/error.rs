//! Error types for FreeSWITCH ESL operations.
//!
//! All fallible operations in this crate return [`EslResult<T>`].  The four
//! protocol-level failures every caller has to handle are
//! [`EslError::AuthenticationFailed`], [`EslError::ConnectionLost`],
//! [`EslError::CommandTimeout`] and [`EslError::MalformedFrame`]; the rest
//! narrow down where in the connection lifecycle something went wrong.
//!
//! Errors are classified on two axes for caller convenience:
//!
//! - **Connection errors** ([`EslError::is_connection_error`]): the TCP session
//!   is dead and must not be reused.
//! - **Recoverable errors** ([`EslError::is_recoverable`]): the request failed
//!   but issuing it again later may succeed (timeouts, rejected commands,
//!   lost connections).
//!
//! The command path never retries on its own: retry policy belongs to the
//! caller, since administrative commands are not idempotent.

use crate::connection::ConnectionState;
use thiserror::Error;

/// Result type alias for ESL operations
pub type EslResult<T> = Result<T, EslError>;

/// Error types for ESL operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EslError {
    /// IO error while establishing the TCP connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared secret was rejected by FreeSWITCH
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Socket error, EOF or disconnect notice in the middle of an operation
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// No reply arrived before the command deadline
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    /// Framing violation; the connection is torn down
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    /// TCP connect or auth handshake did not finish in time
    #[error("Connect timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// Bounded receive expired without a complete frame
    #[error("Receive timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Operation attempted while the connection is not in the Ready state
    #[error("Connection not ready (state: {state:?})")]
    NotReady { state: ConnectionState },

    /// FreeSWITCH answered with a `-ERR` command/reply
    #[error("Command rejected: {reply_text}")]
    CommandRejected { reply_text: String },

    /// Command text that cannot be framed on the wire
    #[error("Invalid command: {command:?}")]
    InvalidCommand { command: String },

    /// Argument to a command builder that would split into extra words
    #[error("Invalid argument for {name}: {value:?}")]
    InvalidArgument { name: &'static str, value: String },
}

impl EslError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// `true` if the same request may succeed when issued again later.
    ///
    /// Recoverable: `CommandTimeout`, `Timeout`, `ConnectTimeout`,
    /// `CommandRejected`, `ConnectionLost` and `Io`. Authentication and framing failures will repeat until configuration or
    /// the peer changes.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EslError::CommandTimeout { .. } => true,
            EslError::Timeout { .. } => true,
            EslError::ConnectTimeout { .. } => true,
            EslError::CommandRejected { .. } => true,
            EslError::ConnectionLost { .. } => true,
            EslError::Io(_) => true,
            _ => false,
        }
    }

    /// `true` if the TCP session is dead and must be discarded.
    ///
    /// Matches: `Io`, `ConnectionLost`, `MalformedFrame`, `CommandTimeout`.
    /// A timed-out command poisons its connection: a late reply would be
    /// paired with the wrong request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            EslError::Io(_)
                | EslError::ConnectionLost { .. }
                | EslError::MalformedFrame { .. }
                | EslError::CommandTimeout { .. }
        )
    }

    /// Stable snake_case code naming the failure class.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EslError::Io(_) => "io_error",
            EslError::AuthenticationFailed { .. } => "authentication_failed",
            EslError::ConnectionLost { .. } => "connection_lost",
            EslError::CommandTimeout { .. } => "command_timeout",
            EslError::MalformedFrame { .. } => "malformed_frame",
            EslError::ConnectTimeout { .. } => "connect_timeout",
            EslError::Timeout { .. } => "timeout",
            EslError::NotReady { .. } => "not_ready",
            EslError::CommandRejected { .. } => "command_rejected",
            EslError::InvalidCommand { .. } => "invalid_command",
            EslError::InvalidArgument { .. } => "invalid_argument",
        }
    }
}
