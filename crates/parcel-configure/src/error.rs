//! Error types for package configuration
//!
//! Staging and parsing errors abort an invocation and surface as a single
//! terminal [`ConfigureError`]. Step failures never show up here; they live
//! in the per-step outcomes of the execution result.

use parcel_document::DocumentError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A local filesystem operation failed
#[derive(Debug, Error)]
#[error("failed to {op} {}: {source}", path.display())]
pub struct FilesystemError {
    /// What was being attempted ("create directory", "write", ...)
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FilesystemError {
    pub fn new(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Archive extraction failed
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The archive could not be decoded
    #[error("corrupt archive {}: {reason}", archive.display())]
    Corrupt { archive: PathBuf, reason: String },

    /// Neither a zip nor a gzip tarball
    #[error("unsupported archive format: {}", archive.display())]
    UnsupportedFormat { archive: PathBuf },

    /// Extracted content could not be written
    #[error("destination not writable {}: {source}", dest.display())]
    DestinationNotWritable {
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive itself could not be opened or read
    #[error("cannot read archive {}: {source}", archive.display())]
    SourceUnreadable {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Terminal error of a configure invocation
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl ConfigureError {
    /// Taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigureError::Filesystem(_) => "FilesystemError",
            ConfigureError::Extraction(_) => "ExtractionError",
            ConfigureError::Document(e) if e.is_validation() => "ValidationError",
            ConfigureError::Document(_) => "ParseError",
        }
    }
}

/// Result type for configure operations
pub type Result<T> = std::result::Result<T, ConfigureError>;
