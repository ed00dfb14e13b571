use std::{io, path::PathBuf};

/// Errors that can occur when configuring or writing through a
/// [`FileLogSink`](crate::FileLogSink).
///
/// Configuration errors (`InvalidSizeSpec`, `InvalidFilePath`,
/// `InvalidArchivePattern`) are returned from the builder. Append errors are
/// returned from `write`. Everything else describes a failed rotation, which is
/// reported through the rotation error hook and never fails the write.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Invalid size specification '{0}': expected an integer with an optional K, M or G suffix")]
    InvalidSizeSpec(String),
    #[error("Invalid log file path '{0}': a file name is required")]
    InvalidFilePath(PathBuf),
    #[error("Invalid archive name format '{format}': {error}")]
    InvalidArchivePattern { format: String, error: String },
    #[error("Failed to write archive '{path}': {source}")]
    ArchiveWriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Archive '{0}' already exists, refusing to overwrite it")]
    ArchivePathCollision(PathBuf),
    #[error("I/O error on live file '{path}': {source}")]
    LiveFileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to append to '{path}': {source}")]
    AppendFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to list archive directory '{path}': {source}")]
    DirectoryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to lock '{path}': {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SinkError {
    /// Whether this error came out of a rotation attempt, as opposed to the
    /// configuration or the append step.
    pub fn is_rotation_error(&self) -> bool {
        matches!(
            self,
            SinkError::ArchiveWriteError { .. } | SinkError::ArchivePathCollision(_) | SinkError::LiveFileIo { .. }
        )
    }
}
