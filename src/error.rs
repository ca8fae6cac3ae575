//! Error types for ibctx.

use std::io;

/// Device-context operation errors.
///
/// Only unrecoverable construction failures and pass-through hardware
/// failures surface here. Recoverable port queries report a `bool`,
/// clock-capability probing degrades silently, and teardown failures are
/// logged but never returned.
#[derive(Debug)]
pub enum Error {
    /// Protection-domain allocation failed. Construction aborts; there is
    /// no retry path for this condition.
    PdAlloc(io::Error),
    /// Device attribute query failed during construction. Construction
    /// aborts and the already-allocated protection domain is released.
    DeviceQuery(io::Error),
    /// IO error from the underlying verbs layer.
    Io(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PdAlloc(e) => write!(f, "protection domain allocation failed: {}", e),
            Error::DeviceQuery(e) => write!(f, "device attribute query failed: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PdAlloc(e) | Error::DeviceQuery(e) | Error::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type for ibctx operations.
pub type Result<T> = std::result::Result<T, Error>;
