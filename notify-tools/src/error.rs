//! Error types

use std::{
    error::Error as StdError,
    fmt, io,
    path::{Path, PathBuf},
    result::Result as StdResult,
};

use notify_tools_types::ParseMaskError;

use crate::format::FormatError;

/// Type alias to use this library's [`Error`] type in a Result
pub type Result<T> = StdResult<T, Error>;

/// Error kinds
#[derive(Debug)]
pub enum ErrorKind {
    /// Generic error
    ///
    /// May be used in cases where a platform specific error is mapped to this type, or for opaque
    /// internal errors.
    Generic(String),

    /// I/O errors.
    Io(io::Error),

    /// A path does not exist.
    PathNotFound,

    /// Can't add another watch: the per-user watch limit was reached.
    MaxFilesWatch,

    /// The notification source broke its record contract.
    Protocol(ProtocolError),

    /// A template could not be rendered.
    Format(FormatError),

    /// An event filter pattern did not compile.
    InvalidPattern(regex::Error),

    /// An event mask could not be parsed.
    InvalidMask(ParseMaskError),
}

/// Ways the raw record stream can violate its contract.
///
/// Both are unrecoverable for the reader that hit them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// A read returned zero bytes although the source reported readiness.
    UnexpectedEof,

    /// A single record declares more bytes than the stream buffer can ever hold.
    RecordTooLarge {
        /// Total size of the record, header included.
        len: usize,
        /// Size of the stream buffer.
        capacity: usize,
    },

    /// The source refused a read because its next record does not fit in the free part of
    /// the stream buffer.
    RecordRefused {
        /// Bytes the read offered.
        available: usize,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedEof => f.write_str("notification stream ended unexpectedly"),
            ProtocolError::RecordTooLarge { len, capacity } => write!(
                f,
                "record of {len} bytes does not fit in a {capacity} byte buffer"
            ),
            ProtocolError::RecordRefused { available } => write!(
                f,
                "next record does not fit in the {available} free bytes of the buffer"
            ),
        }
    }
}

/// Notify-tools error type.
///
/// Errors are emitted either at creation time of a context, or during the operations it
/// performs. An error carries the paths it concerns, when known.
#[derive(Debug)]
pub struct Error {
    /// Kind of the error.
    pub kind: ErrorKind,

    /// Relevant paths to the error, if any.
    pub paths: Vec<PathBuf>,
}

impl Error {
    /// Adds a path to the error.
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Creates a new Error with empty paths given its kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            paths: Vec::new(),
        }
    }

    /// Creates a new generic Error from a message.
    pub fn generic(msg: &str) -> Self {
        Self::new(ErrorKind::Generic(msg.into()))
    }

    /// Creates a new i/o Error from a stdlib `io::Error`.
    pub fn io(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }

    /// Similar to [`Error::io`], but specialized for errors returned while adding a watch.
    ///
    /// An exhausted watch limit is reported as [`ErrorKind::MaxFilesWatch`] and a missing
    /// path as [`ErrorKind::PathNotFound`].
    pub fn io_watch(err: io::Error, path: &Path) -> Self {
        let kind = if err.raw_os_error() == Some(libc::ENOSPC) {
            // do not report inotify limits as "no more space" on linux
            ErrorKind::MaxFilesWatch
        } else if err.kind() == io::ErrorKind::NotFound {
            ErrorKind::PathNotFound
        } else {
            ErrorKind::Io(err)
        };
        Self::new(kind).add_path(path)
    }

    /// Creates a new "path not found" error.
    pub fn path_not_found() -> Self {
        Self::new(ErrorKind::PathNotFound)
    }

    /// Creates a new protocol violation error.
    pub fn protocol(err: ProtocolError) -> Self {
        Self::new(ErrorKind::Protocol(err))
    }

    /// Whether the underlying cause is an I/O error of the given kind.
    pub fn is_io_kind(&self, kind: io::ErrorKind) -> bool {
        matches!(&self.kind, ErrorKind::Io(err) if err.kind() == kind)
    }

    /// The raw OS error code of an I/O error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error = match self.kind {
            ErrorKind::PathNotFound => "No path was found.".into(),
            ErrorKind::MaxFilesWatch => "OS file watch limit reached.".into(),
            ErrorKind::Generic(ref err) => err.clone(),
            ErrorKind::Io(ref err) => err.to_string(),
            ErrorKind::Protocol(ref err) => err.to_string(),
            ErrorKind::Format(ref err) => err.to_string(),
            ErrorKind::InvalidPattern(ref err) => err.to_string(),
            ErrorKind::InvalidMask(ref err) => err.to_string(),
        };

        if self.paths.is_empty() {
            write!(f, "{error}")
        } else {
            write!(f, "{} about {:?}", error, self.paths)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.kind {
            ErrorKind::Io(ref cause) => Some(cause),
            ErrorKind::Format(ref cause) => Some(cause),
            ErrorKind::InvalidPattern(ref cause) => Some(cause),
            ErrorKind::InvalidMask(ref cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::new(ErrorKind::Format(err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::new(ErrorKind::InvalidPattern(err))
    }
}

impl From<ParseMaskError> for Error {
    fn from(err: ParseMaskError) -> Self {
        Error::new(ErrorKind::InvalidMask(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_error_with_paths() {
        let err = Error::path_not_found().add_path("/tmp/gone");
        assert_eq!(err.to_string(), "No path was found. about [\"/tmp/gone\"]");
    }

    #[test]
    fn io_watch_maps_limits_and_missing_paths() {
        let path = Path::new("/some/path");

        let err = Error::io_watch(io::Error::from_raw_os_error(libc::ENOSPC), path);
        assert!(matches!(err.kind, ErrorKind::MaxFilesWatch));
        assert_eq!(err.paths, vec![PathBuf::from("/some/path")]);

        let err = Error::io_watch(io::Error::from_raw_os_error(libc::ENOENT), path);
        assert!(matches!(err.kind, ErrorKind::PathNotFound));

        let err = Error::io_watch(io::Error::from_raw_os_error(libc::EACCES), path);
        assert!(err.is_io_kind(io::ErrorKind::PermissionDenied));
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
    }

    #[test]
    fn protocol_error_display() {
        let err = Error::protocol(ProtocolError::RecordTooLarge {
            len: 300,
            capacity: 256,
        });
        assert_eq!(
            err.to_string(),
            "record of 300 bytes does not fit in a 256 byte buffer"
        );
    }
}
