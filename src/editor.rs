//! Interactive line editing on top of `rustyline`.
//!
//! The first word of a line completes to builtin names and executables found
//! on `PATH`; later words complete to paths relative to the interpreter's
//! working directory.

use crate::builtin::Builtin;
use crate::env::Environment;
use crate::external::executables_with_prefix;
use crate::interpreter::{Input, LineSource};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Completion state, refreshed from the interpreter before every prompt.
#[derive(Debug, Clone)]
pub struct ShellHelper {
    env: Environment,
}

impl ShellHelper {
    pub fn new(env: &Environment) -> Self {
        Self { env: env.clone() }
    }

    pub fn sync(&mut self, env: &Environment) {
        self.env.clone_from(env);
    }

    /// Candidates for the word ending at `pos`, and where that word starts.
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let before = &line[..pos];
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());
        let word = &before[start..];

        let pairs = if before[..start].trim().is_empty() {
            command_pairs(&self.env, word)
        } else {
            path_pairs(&self.env.current_dir, word)
        };
        (start, pairs)
    }
}

fn command_pairs(env: &Environment, prefix: &str) -> Vec<Pair> {
    let mut names: BTreeSet<String> = Builtin::ALL
        .into_iter()
        .map(Builtin::name)
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();
    names.extend(executables_with_prefix(env, prefix));

    let unique = names.len() == 1;
    names
        .into_iter()
        .map(|name| Pair {
            replacement: if unique { format!("{name} ") } else { name.clone() },
            display: name,
        })
        .collect()
}

fn path_pairs(cwd: &Path, word: &str) -> Vec<Pair> {
    let (dir_part, prefix) = match word.rfind('/') {
        Some(i) => (&word[..=i], &word[i + 1..]),
        None => ("", word),
    };
    let dir = if dir_part.is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(dir_part)
    };
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut matches: Vec<(String, bool)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !name.starts_with(prefix) || (prefix.is_empty() && name.starts_with('.')) {
                return None;
            }
            let is_dir = fs::metadata(entry.path()).is_ok_and(|m| m.is_dir());
            Some((name, is_dir))
        })
        .collect();
    matches.sort();

    let unique = matches.len() == 1;
    matches
        .into_iter()
        .map(|(name, is_dir)| {
            let suffix = match (is_dir, unique) {
                (true, _) => "/",
                (false, true) => " ",
                (false, false) => "",
            };
            Pair {
                replacement: format!("{dir_part}{name}{suffix}"),
                display: if is_dir { format!("{name}/") } else { name },
            }
        })
        .collect()
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// The terminal front end of the read-eval loop.
pub struct LineEditor {
    editor: Editor<ShellHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl LineEditor {
    /// Creates an editor, loading history from `history_file` when it exists.
    pub fn new(env: &Environment, history_file: Option<PathBuf>) -> rustyline::Result<Self> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ShellHelper::new(env)));

        if let Some(path) = &history_file {
            match editor.load_history(path) {
                Ok(()) => debug!(path = %path.display(), "history loaded"),
                Err(e) => debug!(path = %path.display(), error = %e, "no history loaded"),
            }
        }
        Ok(Self {
            editor,
            history_file,
        })
    }

    /// Writes the history back to the file it was loaded from, if any.
    pub fn save_history(&mut self) -> rustyline::Result<()> {
        match &self.history_file {
            Some(path) => self.editor.save_history(path),
            None => Ok(()),
        }
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str, env: &Environment) -> anyhow::Result<Input> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.sync(env);
        }
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(err.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            warn!(error = %e, "could not record history");
        }
    }
}
