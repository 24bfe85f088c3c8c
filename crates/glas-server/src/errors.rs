//! Gateway error taxonomy.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use glas_core::{CodecError, EngineError};
use thiserror::Error;

/// How a connection ended, as seen by the reading side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseKind {
    /// The client closed with a normal or going-away close frame.
    Graceful,
    /// Abnormal close code, dropped socket, or read failure.
    Unexpected,
}

impl fmt::Display for CloseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => f.write_str("graceful close"),
            Self::Unexpected => f.write_str("unexpected close"),
        }
    }
}

/// Errors raised by a transport half.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Receiving failed or the connection closed.
    #[error("{kind}: {detail}")]
    Read {
        /// Close classification.
        kind: CloseKind,
        /// Close reason or underlying error.
        detail: String,
    },
    /// Sending a frame failed.
    #[error("failed to write frame: {detail}")]
    Write {
        /// Underlying error.
        detail: String,
    },
}

impl TransportError {
    /// A graceful read-side close.
    pub fn graceful(detail: impl Into<String>) -> Self {
        Self::Read {
            kind: CloseKind::Graceful,
            detail: detail.into(),
        }
    }

    /// An unexpected read-side close.
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::Read {
            kind: CloseKind::Unexpected,
            detail: detail.into(),
        }
    }

    /// A write failure.
    pub fn write(detail: impl Into<String>) -> Self {
        Self::Write {
            detail: detail.into(),
        }
    }
}

/// Why a session ended.
///
/// Exactly one of these is retained per session. Only variants for which
/// [`SessionError::is_fault`] is true are surfaced to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A client frame could not be decoded.
    #[error("malformed client frame: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },
    /// A server message could not be encoded.
    #[error("failed to encode message: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },
    /// Sending to the client failed.
    #[error("transport write failed: {detail}")]
    TransportWrite {
        /// Underlying error.
        detail: String,
    },
    /// Reading from the client ended.
    #[error("transport read ended ({kind}): {detail}")]
    TransportRead {
        /// Close classification.
        kind: CloseKind,
        /// Close reason or underlying error.
        detail: String,
    },
    /// The engine failed to start or terminated abnormally.
    #[error("{message}")]
    Engine {
        /// Engine error message.
        message: String,
    },
    /// The engine completed on its own.
    #[error("engine finished")]
    EngineFinished,
    /// The session was cancelled from outside or by the engine.
    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether this ending is a fault to surface.
    pub fn is_fault(&self) -> bool {
        !matches!(
            self,
            Self::EngineFinished
                | Self::Cancelled
                | Self::TransportRead {
                    kind: CloseKind::Graceful,
                    ..
                }
        )
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::TransportWrite { .. } => "transport_write",
            Self::TransportRead {
                kind: CloseKind::Graceful,
                ..
            } => "client_closed",
            Self::TransportRead { .. } => "unexpected_close",
            Self::Engine { .. } => "engine",
            Self::EngineFinished => "engine_finished",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Read { kind, detail } => Self::TransportRead { kind, detail },
            TransportError::Write { detail } => Self::TransportWrite { detail },
        }
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Encode(e) => Self::Encode {
                message: e.to_string(),
            },
            other => Self::Decode {
                message: other.to_string(),
            },
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        Self::Engine {
            message: err.to_string(),
        }
    }
}

/// Failure to establish a session. No session machinery exists yet.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// The `Origin` header is not allowed by the configured policy.
    #[error("origin not allowed: {}", origin.as_deref().unwrap_or("<none>"))]
    OriginRejected {
        /// Offending origin, if present.
        origin: Option<String>,
    },
    /// The request is not a valid WebSocket upgrade.
    #[error("error upgrading request to websocket: {message}")]
    Handshake {
        /// Status the handshake rejection maps to.
        status: StatusCode,
        /// Rejection text.
        message: String,
    },
}

impl UpgradeError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::OriginRejected { .. } => StatusCode::FORBIDDEN,
            Self::Handshake { status, .. } => *status,
        }
    }
}

impl IntoResponse for UpgradeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
