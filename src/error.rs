//! Error taxonomy for the engine.
//!
//! Public operations return [`anyhow::Result`], but the root cause of every
//! error the engine raises itself is a [`FrameError`]. Callers that need to
//! branch on the category (for instance an embedding layer translating into
//! host exceptions) use [`error_kind`] instead of matching on messages.
//!
//! ```
//! use ironframe::error::{error_kind, ErrorKind, FrameError};
//!
//! let err: anyhow::Error = FrameError::value("column index 7 is out of range").into();
//! assert_eq!(error_kind(&err), Some(ErrorKind::Value));
//! ```

use std::fmt;

/// Category of a [`FrameError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation requested on an incompatible column type.
    Type,
    /// Malformed user-level argument.
    Value,
    /// Malformed file, truncated input, size mismatch, or an OS-level I/O failure.
    Io,
    /// A buffer could not be allocated or grown.
    Alloc,
    /// A job was cancelled cooperatively.
    Aborted,
    /// The requested combination is recognised but not supported.
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Io => "IOError",
            ErrorKind::Alloc => "MemoryError",
            ErrorKind::Aborted => "AbortedError",
            ErrorKind::NotImplemented => "NotImplementedError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("type error: {0}")]
    Type(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("io error: {0}")]
    Os(#[from] std::io::Error),

    #[error("allocation error: {0}")]
    Alloc(String),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl FrameError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        FrameError::Type(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        FrameError::Value(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        FrameError::Io(msg.into())
    }

    pub fn alloc(msg: impl Into<String>) -> Self {
        FrameError::Alloc(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        FrameError::Aborted(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        FrameError::NotImplemented(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Type(_) => ErrorKind::Type,
            FrameError::Value(_) => ErrorKind::Value,
            FrameError::Io(_) | FrameError::Os(_) => ErrorKind::Io,
            FrameError::Alloc(_) => ErrorKind::Alloc,
            FrameError::Aborted(_) => ErrorKind::Aborted,
            FrameError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

/// Classify an error produced by this crate.
///
/// Walks the `anyhow` context chain, so errors that had context attached on
/// their way up are still recognised. Returns `None` for foreign errors.
#[must_use]
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FrameError>())
        .map(FrameError::kind)
        .or_else(|| {
            err.chain()
                .any(|cause| cause.is::<std::io::Error>())
                .then_some(ErrorKind::Io)
        })
}
