use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a whole move request
#[derive(Debug, Error)]
pub enum MoveError {
    /// Precondition violation: missing source, destination conflict, no-op move
    #[error("invalid move of {}: {reason}", .path.display())]
    InvalidMove { path: PathBuf, reason: String },

    /// A path that does not denote a source module or package
    #[error("{} is not a source file or package", .0.display())]
    NotASourceFile(PathBuf),

    /// The physical move itself failed
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Fold mapper failures into `InvalidMove`, as seen by planning callers
    pub(crate) fn into_invalid_move(self) -> Self {
        match self {
            Self::NotASourceFile(path) => Self::InvalidMove {
                reason: "not a source file or package inside the repository".to_owned(),
                path,
            },
            other => other,
        }
    }
}

/// Result of a planning or move operation
pub type Result<T, E = MoveError> = std::result::Result<T, E>;

/// Why a file was left untouched by a rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read as UTF-8 text
    Read(String),
    /// The file does not parse
    Parse(String),
    /// The rewritten file could not be saved
    Write(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(msg) => write!(f, "read error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Write(msg) => write!(f, "write error: {msg}"),
        }
    }
}
