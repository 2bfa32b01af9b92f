use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by any step of a formula run.
///
/// Every variant aborts the installation; nothing is retried or downgraded
/// to a warning.
#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("ResolutionError: {0}")]
    Resolution(String),

    #[error("DownloadError: {url}: {message}")]
    Download { url: String, message: String },

    #[error("ChecksumMismatchError: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("FilesystemError: {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ArchiveError: {0}")]
    Archive(String),

    #[error("RewriteError: {}: {message}", binary.display())]
    Rewrite { binary: PathBuf, message: String },

    #[error("{name} is already installed ({because}); uninstall it first")]
    Conflict { name: String, because: String },

    #[error("smoke test failed: {0}")]
    SmokeTest(String),

    #[error("ConfigError: {0}")]
    Config(String),

    #[error("{0} is not installed")]
    NotInstalled(String),
}

impl FormulaError {
    /// Wraps an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn download(url: &str, message: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn rewrite(binary: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Rewrite {
            binary: binary.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = FormulaError> = std::result::Result<T, E>;
