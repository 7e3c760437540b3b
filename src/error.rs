//! Unified error type.

use http::StatusCode;

/// Convenience alias used by handlers and middleware.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// The error type flowing through handlers, middleware and engines.
///
/// Handlers return it instead of writing a response when something went
/// wrong; every enclosing middleware sees it on the way back up and may
/// inspect, replace or swallow it. Only the engine turns an error that
/// survives the whole chain into a final HTTP response, via [`Error::status`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A handler-raised HTTP error (`404 user not found`, `401 missing token`).
    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    /// Code written against one engine's native context ran on another engine.
    ///
    /// This is a programming error. It is returned on the first request that
    /// hits the mismatch instead of being ignored.
    #[error("context mismatch: expected native `{expected}`, engine provides `{found}`")]
    ContextMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The engine refused a route at registration time.
    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    /// The listen address is not a valid `host:port`.
    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else a handler wants to bubble up.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Builds an [`Error::Http`].
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Wraps an arbitrary error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// The status an engine answers with when this error reaches it.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
