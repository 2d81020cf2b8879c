//! Error types for the tree watcher.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::registry::WatchHandle;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize notification source: {reason}")]
    InitFailed { reason: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An event referenced a handle that was never registered.
    #[error("Event for unknown watch handle {handle}")]
    UnknownHandle { handle: WatchHandle },

    #[error("Truncated event record at offset {offset} ({remaining} bytes left)")]
    TruncatedRecord { offset: usize, remaining: usize },

    #[error("Cannot watch {path}: {source}")]
    RegistrationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Event stream read failed: {0}")]
    StreamRead(#[source] io::Error),

    #[error("Cannot append to log {path}: {source}")]
    LogSinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WatchError {
    /// Classify a failure to open `path` as a directory.
    pub(crate) fn from_open(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => WatchError::PermissionDenied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::NotADirectory => WatchError::NotADirectory {
                path: path.to_path_buf(),
            },
            _ => WatchError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_open_classification() {
        let path = Path::new("/srv/data");

        let err = WatchError::from_open(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, WatchError::PermissionDenied { .. }));

        let err = WatchError::from_open(path, io::Error::from(io::ErrorKind::NotADirectory));
        assert!(matches!(err, WatchError::NotADirectory { .. }));

        let err = WatchError::from_open(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, WatchError::Io { .. }));
    }

    #[test]
    fn test_messages() {
        let err = WatchError::UnknownHandle {
            handle: WatchHandle::new(42),
        };
        assert_eq!(err.to_string(), "Event for unknown watch handle 42");

        let err = WatchError::TruncatedRecord {
            offset: 32,
            remaining: 7,
        };
        assert!(err.to_string().contains("offset 32"));
    }
}
