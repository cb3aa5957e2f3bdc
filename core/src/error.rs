//! Error types for the gateway client.
//!
//! # Design
//! One variant per failure kind a caller may want to tell apart: bad provider
//! configuration, an unencodable payload, a request that never got an
//! answer, a non-2xx answer, and a 2xx answer whose body could not be
//! decoded. `Config` is the only kind raised before any I/O starts; every
//! other kind comes back through the call's result.

use thiserror::Error;

/// Errors returned by `GatewayClient` and its pipeline stages.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider configuration supplied by the caller is unusable.
    #[error("invalid provider configuration: {0}")]
    Config(String),

    /// The payload cannot be turned into a request body.
    #[error("cannot encode payload: {0}")]
    Encoding(String),

    /// The request could not be sent or no response was received.
    #[error("transport failure ({kind}): {message}")]
    Transport { kind: TransportErrorKind, message: String },

    /// The gateway answered with a non-2xx status.
    #[error("status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The body of a 2xx response could not be decoded as requested.
    #[error("while parsing data '{body}': {message}")]
    Decode { message: String, body: String },
}

/// Where a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The host could not be reached (DNS, refused connection, TLS).
    Connect,
    /// The transport gave up waiting.
    Timeout,
    /// The request could not be built or written.
    Request,
    /// The response arrived but its framing or body could not be read.
    Body,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
        };
        f.write_str(name)
    }
}

/// Fieldless discriminant of `GatewayError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Encoding,
    Transport,
    HttpStatus,
    Decode,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Config(_) => ErrorKind::Config,
            GatewayError::Encoding(_) => ErrorKind::Encoding,
            GatewayError::Transport { .. } => ErrorKind::Transport,
            GatewayError::HttpStatus { .. } => ErrorKind::HttpStatus,
            GatewayError::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Status code of the gateway's answer, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the host was never reached or never answered. A response
    /// whose body could not be read did come from the host.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { kind, .. } if *kind != TransportErrorKind::Body
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        GatewayError::Transport {
            kind,
            message: err.to_string(),
        }
    }
}
