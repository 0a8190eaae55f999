//! Error types for xml-combine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for xml-combine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while combining XML files.
///
/// `InvalidInput`, `NoInputFiles`, `NoFilesProcessed` and `Write` abort a
/// run. `Parse` and `ValidationFailed` are per-file and only counted.
#[derive(Error, Debug)]
pub enum Error {
    /// The input directory or a run option is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Discovery was pointed at something that is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Discovery found no candidate files.
    #[error("no XML files found in {}", .0.display())]
    NoInputFiles(PathBuf),

    /// A file could not be parsed within the allowed attempts.
    #[error("failed to parse {} after {attempts} attempt(s): {message}", .path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Reason reported by the last attempt.
        message: String,
    },

    /// A file failed the well-formedness check requested by a schema path.
    #[error("validation failed for {}: {message}", .path.display())]
    ValidationFailed {
        /// The offending file.
        path: PathBuf,
        /// Why the document was rejected.
        message: String,
    },

    /// Every discovered file failed.
    #[error("none of the {discovered} discovered file(s) could be processed")]
    NoFilesProcessed {
        /// Number of files that were attempted.
        discovered: usize,
    },

    /// The combined document could not be written.
    #[error("failed to write {}", .path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Well-formedness violation found by the parser.
    #[error("XML syntax error: {0}")]
    Syntax(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::NotADirectory(_)
                | Error::NoInputFiles(_)
                | Error::NoFilesProcessed { .. }
                | Error::Write { .. }
        )
    }
}
