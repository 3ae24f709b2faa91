//! Error types for the fan-out core.

use std::fmt;

/// Errors surfaced by the fan-out core.
///
/// Payload errors are produced while decoding inbound frames and are handled by
/// the transport before a message ever reaches a session. Transport errors are
/// forwarded to the owning session, which logs them and keeps running.
#[derive(Debug)]
pub enum Error {
    /// The inbound payload was not a JSON object of the expected shape.
    MalformedPayload(String),

    /// A required field was absent or empty.
    MissingField(&'static str),

    /// An outbound message could not be encoded.
    Serialization(String),

    /// Read or write failure on the underlying connection, short of a full disconnect.
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Transport(err.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            Error::MissingField(field) => write!(f, "Missing required field: {}", field),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Transport(err) => write!(f, "Transport error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
