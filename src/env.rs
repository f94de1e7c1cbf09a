use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

/// Mutable, user-level view of the process state used by the interpreter.
///
/// The environment contains:
/// - `vars`: environment variables visible to executed commands and used for
///   `PATH` and `HOME` lookups.
/// - `current_dir`: the working directory for command execution.
/// - `last_status`: exit status of the most recently executed command.
///
/// Only the `cd` builtin writes `current_dir`. Nothing else in the crate
/// consults the process-wide working directory or environment.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Exit status of the last command, kept for a future `$?`.
    pub last_status: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars_os()` and initializes
    /// `current_dir` from `std::env::current_dir()`. Variables whose name or
    /// value is not valid Unicode are left out.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_os_vars(stdenv::vars_os(), current_dir)
    }

    /// Build an environment from raw variable pairs, skipping non-Unicode ones.
    pub fn from_os_vars(
        vars: impl IntoIterator<Item = (OsString, OsString)>,
        current_dir: impl Into<PathBuf>,
    ) -> Self {
        let vars = vars
            .into_iter()
            .filter_map(|(key, val)| match (key.into_string(), val.into_string()) {
                (Ok(key), Ok(val)) => Some((key, val)),
                (key, _) => {
                    let key = key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                    debug!(%key, "skipping variable that is not valid Unicode");
                    None
                }
            })
            .collect();
        Self {
            vars,
            current_dir: current_dir.into(),
            last_status: None,
        }
    }

    /// An environment with no variables at all, rooted at `current_dir`.
    pub fn empty(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: current_dir.into(),
            last_status: None,
        }
    }

    /// Get the value of a variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The search path, read fresh on every call.
    pub fn search_path(&self) -> Option<&str> {
        self.get_var("PATH")
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::env as stdenv;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::empty(stdenv::current_dir().unwrap());

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.search_path().is_some());
        assert_eq!(env.last_status, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_variables_are_skipped() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("PATH"), OsString::from("/bin")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(b"\xff".to_vec())),
            (OsString::from_vec(b"BAD_\xffKEY".to_vec()), OsString::from("x")),
        ];
        let env = Environment::from_os_vars(vars, "/");
        assert_eq!(env.search_path(), Some("/bin"));
        assert_eq!(env.get_var("BAD_VALUE"), None);
        assert_eq!(env.vars.len(), 1);
    }

    #[test]
    fn test_empty_home_is_unset() {
        let mut env = Environment::empty("/");
        assert_eq!(env.home_dir(), None);
        env.set_var("HOME", "");
        assert_eq!(env.home_dir(), None);
        env.set_var("HOME", "/home/someone");
        assert_eq!(env.home_dir(), Some("/home/someone".into()));
    }
}
