//! Error taxonomy of the execution engine.
//!
//! Every variant renders as the exact message the user sees on the stderr
//! target; none of them ends the interpreter.

use crate::command::ExitCode;
use crate::parser::ParsingError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed redirection syntax; nothing was executed.
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// Neither a builtin nor an executable on the search path.
    #[error("{name}: command not found")]
    NotFound { name: String },

    /// A redirection target could not be opened.
    #[error("{}: {}", .path.display(), describe(.source))]
    Redirect { path: PathBuf, source: io::Error },

    /// The executable was found but the process could not be started.
    #[error("{name}: {}", describe(.source))]
    Launch { name: String, source: io::Error },

    #[error("{}", describe(.0))]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Status recorded for a command that failed this way.
    pub fn status(&self) -> ExitCode {
        match self {
            ShellError::Parsing(_) => 2,
            ShellError::NotFound { .. } => 127,
            ShellError::Launch { .. } => 126,
            ShellError::Redirect { .. } | ShellError::Io(_) => 1,
        }
    }
}

/// POSIX-style description of an I/O error, without the `(os error N)` suffix.
pub fn describe(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        io::ErrorKind::NotADirectory => "Not a directory".to_string(),
        io::ErrorKind::IsADirectory => "Is a directory".to_string(),
        _ => {
            let text = err.to_string();
            match text.find(" (os error") {
                Some(idx) => text[..idx].to_string(),
                None => text,
            }
        }
    }
}
