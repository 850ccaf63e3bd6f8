//! Configuration error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a configured path cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
    /// Nothing exists at the path.
    Missing,
    /// A file was expected.
    NotAFile,
    /// A directory was expected.
    NotADirectory,
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathProblem::Missing => "does not exist",
            PathProblem::NotAFile => "is not a file",
            PathProblem::NotADirectory => "is not a directory",
        })
    }
}

/// Errors raised while loading or validating [`super::ServerConfig`].
///
/// Every variant names the `FACEMATCH_*` variable at fault.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The variable is set but its value is unusable.
    #[error("{name}={value:?} is invalid: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A required variable is not set.
    #[error("{name} must be set")]
    Missing { name: &'static str },

    /// The variable points at a path that cannot be used.
    #[error("{name} points to {}, which {problem}", .path.display())]
    UnusablePath {
        name: &'static str,
        path: PathBuf,
        problem: PathProblem,
    },
}
