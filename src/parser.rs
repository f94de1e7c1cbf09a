//! Turns a token stream into a [`ParsedCommand`]: the command word, its
//! arguments, and the output redirections found anywhere on the line.

use crate::lexer::{self, Token};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// `>`, `>>`, `1>`, `1>>`, `2>`, `2>>`, as whole words.
static REDIRECT_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<fd>[12]?)(?P<op>>>?)$").expect("redirect operator pattern is valid")
});

/// Which of the two output streams a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// How a redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>`: the file is created or emptied.
    Truncate,
    /// `>>`: writes go to the end of the file, which is created if missing.
    Append,
}

/// A file an output stream is bound to for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub path: PathBuf,
    pub mode: RedirectMode,
}

impl RedirectTarget {
    pub fn new(path: impl Into<PathBuf>, mode: RedirectMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// A command line with redirections separated out.
///
/// Operators and their filenames are removed from the positional stream;
/// `args` keeps the remaining words in their original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: String,
    pub args: Vec<String>,
    pub stdout: Option<RedirectTarget>,
    pub stderr: Option<RedirectTarget>,
}

/// Malformed redirection syntax. The command must not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsingError {
    /// An operator was the last word of the line.
    #[error("syntax error near unexpected token `newline'")]
    MissingTarget,
    /// An operator was directly followed by another operator.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedOperator(String),
    /// The line held redirections but no command word.
    #[error("syntax error: missing command")]
    MissingCommand,
}

fn redirect_operator(token: &Token) -> Option<(Stream, RedirectMode)> {
    if token.quoted {
        return None;
    }
    let caps = REDIRECT_OPERATOR.captures(&token.text)?;
    let stream = match &caps["fd"] {
        "2" => Stream::Stderr,
        _ => Stream::Stdout,
    };
    let mode = match &caps["op"] {
        ">>" => RedirectMode::Append,
        _ => RedirectMode::Truncate,
    };
    Some((stream, mode))
}

/// Separate redirections from positional words.
///
/// Returns `Ok(None)` for an empty token stream. When the same stream is
/// redirected more than once, the last redirection wins.
pub fn parse_command(tokens: Vec<Token>) -> Result<Option<ParsedCommand>, ParsingError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut words = Vec::new();
    let mut stdout = None;
    let mut stderr = None;

    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        let Some((stream, mode)) = redirect_operator(&token) else {
            words.push(token.text);
            continue;
        };
        let target = match tokens.next() {
            None => return Err(ParsingError::MissingTarget),
            Some(next) if redirect_operator(&next).is_some() => {
                return Err(ParsingError::UnexpectedOperator(next.text));
            }
            Some(next) => RedirectTarget::new(next.text, mode),
        };
        match stream {
            Stream::Stdout => stdout = Some(target),
            Stream::Stderr => stderr = Some(target),
        }
    }

    let mut words = words.into_iter();
    let command = words.next().ok_or(ParsingError::MissingCommand)?;
    Ok(Some(ParsedCommand {
        command,
        args: words.collect(),
        stdout,
        stderr,
    }))
}

/// Tokenize and parse a raw input line.
pub fn parse_line(line: &str) -> Result<Option<ParsedCommand>, ParsingError> {
    parse_command(lexer::split_into_tokens(line))
}
