//! Unified error type.

/// The error type returned by veslo's fallible operations.
///
/// Per-request failures never surface here: a failing middleware unit is
/// turned into a `500` response by [`App`](crate::App). This type covers
/// setup and infrastructure: bad route patterns, TLS material, binding to a
/// port, and writing a response twice.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("invalid route `{pattern}`: {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("tls: {0}")]
    Tls(String),

    #[error("response already sent")]
    ResponseAlreadySent,
}
