use crate::command::{ExitCode, OutputStream};
use crate::env::Environment;
use crate::error::ShellError;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, trace};

/// A path that was, at resolution time, an executable regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableLocation(PathBuf);

impl ExecutableLocation {
    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

/// Resolve `name` for execution: the first match wins.
///
/// Behavior:
/// - Name containing a path separator (`./foo`, `bin/sh`, `/bin/sh`): checked
///   directly, relative to the interpreter's working directory.
/// - Any other name: each directory of `PATH` is tried in order; empty
///   segments are skipped and relative directories are taken relative to the
///   working directory.
/// - Empty name, or no `PATH` at all: `None`.
///
/// Nothing is cached; `PATH` and the filesystem are consulted on every call.
pub fn resolve(env: &Environment, name: &str) -> Option<ExecutableLocation> {
    candidates(env, name).next()
}

/// Every match for `name`, in search order. Used for introspection by `type -a`.
pub fn resolve_all(env: &Environment, name: &str) -> Vec<ExecutableLocation> {
    candidates(env, name).collect()
}

fn candidates<'a>(
    env: &'a Environment,
    name: &'a str,
) -> impl Iterator<Item = ExecutableLocation> + 'a {
    let dirs = if name.is_empty() {
        Vec::new()
    } else if has_separator(name) {
        vec![env.current_dir.clone()]
    } else {
        search_dirs(env)
    };
    dirs.into_iter().filter_map(move |dir| probe(&dir, name))
}

fn has_separator(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

fn search_dirs(env: &Environment) -> Vec<PathBuf> {
    let Some(search_path) = env.search_path() else {
        return Vec::new();
    };
    std::env::split_paths(OsStr::new(search_path))
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| {
            if dir.is_relative() {
                env.current_dir.join(dir)
            } else {
                dir
            }
        })
        .collect()
}

/// The per-directory check shared by both resolution modes.
fn probe(dir: &Path, name: &str) -> Option<ExecutableLocation> {
    let candidate = dir.join(name);
    let metadata = match fs::metadata(&candidate) {
        Ok(metadata) => metadata,
        Err(_) => {
            trace!(path = %candidate.display(), "no such file");
            return None;
        }
    };
    if !metadata.is_file() {
        trace!(path = %candidate.display(), "not a regular file");
        return None;
    }
    if !is_executable(&metadata) {
        trace!(path = %candidate.display(), "not executable");
        return None;
    }
    Some(ExecutableLocation(candidate))
}

/// Names of executables on the search path that start with `prefix`, sorted.
pub(crate) fn executables_with_prefix(env: &Environment, prefix: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in search_dirs(env) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(prefix) && probe(&dir, &name).is_some() {
                names.insert(name);
            }
        }
    }
    names
}

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    true
}

/// Command that is not a builtin, already resolved to an executable.
pub(crate) struct ExternalCommand {
    name: String,
    location: ExecutableLocation,
    args: Vec<String>,
}

impl ExternalCommand {
    pub(crate) fn new(name: String, location: ExecutableLocation, args: Vec<String>) -> Self {
        Self {
            name,
            location,
            args,
        }
    }

    /// Launch the program and block until it terminates.
    ///
    /// The child sees `name` as its `argv[0]`, the interpreter's variables and
    /// working directory, and inherits stdin. Output streams that can't be
    /// handed over directly are piped and copied once the child has exited.
    pub(crate) fn execute(
        self,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
        env: &Environment,
    ) -> Result<ExitCode, ShellError> {
        let mut cmd = Command::new(self.location.path());
        set_program_name(&mut cmd, &self.name);
        cmd.args(&self.args)
            .envs(env.vars.iter())
            .current_dir(&env.current_dir)
            .stdin(Stdio::inherit());

        let child_stdout = stdout.stdio()?;
        let child_stderr = stderr.stdio()?;
        let captured = child_stdout.is_none() || child_stderr.is_none();
        cmd.stdout(child_stdout.unwrap_or_else(Stdio::piped))
            .stderr(child_stderr.unwrap_or_else(Stdio::piped));

        debug!(program = %self.location.path().display(), args = ?self.args, "spawning");
        let mut child = cmd.spawn().map_err(|source| ShellError::Launch {
            name: self.name.clone(),
            source,
        })?;

        let exit_status = if captured {
            let output = child.wait_with_output()?;
            stdout.write_all(&output.stdout)?;
            stderr.write_all(&output.stderr)?;
            output.status
        } else {
            child.wait()?
        };
        debug!(name = %self.name, status = ?exit_status, "child exited");

        Ok(match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        })
    }
}

#[cfg(unix)]
fn set_program_name(cmd: &mut Command, name: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_program_name(_cmd: &mut Command, _name: &str) {}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io_adapters::MemWriter;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str, mode: u32) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn env_with_path<P: AsRef<Path>>(cwd: &Path, dirs: &[P]) -> Environment {
        let mut env = Environment::empty(cwd);
        let joined = std::env::join_paths(dirs.iter().map(|d| d.as_ref().as_os_str())).unwrap();
        env.set_var("PATH", joined.to_string_lossy());
        env
    }

    #[test]
    fn first_directory_wins_and_all_matches_are_listed() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let a = write_script(&first, "tool", "exit 0", 0o755);
        let b = write_script(&second, "tool", "exit 0", 0o755);

        let env = env_with_path(tmp.path(), &[&first, &second]);
        assert_eq!(resolve(&env, "tool").unwrap().path(), a);
        let all: Vec<PathBuf> = resolve_all(&env, "tool")
            .into_iter()
            .map(ExecutableLocation::into_path_buf)
            .collect();
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn skips_files_without_execute_permission() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        write_script(&first, "tool", "exit 0", 0o644);
        let runnable = write_script(&second, "tool", "exit 0", 0o755);

        let env = env_with_path(tmp.path(), &[&first, &second]);
        assert_eq!(resolve(&env, "tool").unwrap().path(), runnable);
        assert_eq!(resolve_all(&env, "tool").len(), 1);
    }

    #[test]
    fn skips_directories() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(first.join("tool")).unwrap();
        let runnable = write_script(&second, "tool", "exit 0", 0o755);

        let env = env_with_path(tmp.path(), &[&first, &second]);
        assert_eq!(resolve(&env, "tool").unwrap().path(), runnable);
    }

    #[test]
    fn empty_segments_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        write_script(&bin, "tool", "exit 0", 0o755);
        // An empty segment would otherwise mean "current directory".
        write_script(tmp.path(), "here", "exit 0", 0o755);

        let mut env = Environment::empty(tmp.path());
        env.set_var("PATH", format!("::{}:", bin.display()));
        assert!(resolve(&env, "tool").is_some());
        assert!(resolve(&env, "here").is_none());
    }

    #[test]
    fn relative_search_dirs_follow_working_directory() {
        let tmp = TempDir::new().unwrap();
        let expected = write_script(&tmp.path().join("bin"), "tool", "exit 0", 0o755);

        let mut env = Environment::empty(tmp.path());
        env.set_var("PATH", "bin");
        assert_eq!(resolve(&env, "tool").unwrap().path(), expected);
    }

    #[test]
    fn names_with_separator_are_not_searched() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        let script = write_script(&bin, "tool", "exit 0", 0o755);

        let env = env_with_path(tmp.path(), &[&bin]);
        assert!(resolve(&env, "./tool").is_none());
        assert_eq!(resolve(&env, "bin/tool").unwrap().path(), tmp.path().join("bin/tool"));
        assert_eq!(
            resolve(&env, script.to_str().unwrap()).unwrap().path(),
            script
        );
    }

    #[test]
    fn nothing_resolves_without_path_or_name() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "tool", "exit 0", 0o755);
        let env = Environment::empty(tmp.path());
        assert!(resolve(&env, "tool").is_none());
        assert!(resolve(&env, "").is_none());
        assert!(resolve_all(&env, "tool").is_empty());
    }

    #[test]
    fn lists_executables_by_prefix() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        write_script(&first, "gitk", "exit 0", 0o755);
        write_script(&first, "git-notes.txt", "", 0o644);
        write_script(&second, "git", "exit 0", 0o755);
        write_script(&second, "gitk", "exit 0", 0o755);
        write_script(&second, "make", "exit 0", 0o755);

        let env = env_with_path(tmp.path(), &[&first, &second]);
        let names: Vec<String> = executables_with_prefix(&env, "gi").into_iter().collect();
        assert_eq!(names, vec!["git", "gitk"]);
    }

    #[test]
    fn captures_output_and_exit_code() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        write_script(&bin, "greet", "echo \"hello $1\"; echo oops >&2; exit 3", 0o755);
        let env = env_with_path(tmp.path(), &[&bin]);

        let location = resolve(&env, "greet").unwrap();
        let mut out = MemWriter::new();
        let mut err = MemWriter::new();
        let code = ExternalCommand::new("greet".into(), location, vec!["world".into()])
            .execute(&mut out, &mut err, &env)
            .unwrap();

        assert_eq!(code, 3);
        assert_eq!(out.contents(), "hello world\n");
        assert_eq!(err.contents(), "oops\n");
    }

    #[test]
    fn child_runs_in_interpreter_working_directory() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        write_script(&bin, "where", "pwd -P", 0o755);
        let env = env_with_path(tmp.path(), &[&bin]);

        let mut out = MemWriter::new();
        let mut err = MemWriter::new();
        let location = resolve(&env, "where").unwrap();
        ExternalCommand::new("where".into(), location, Vec::new())
            .execute(&mut out, &mut err, &env)
            .unwrap();
        let expected = fs::canonicalize(tmp.path()).unwrap();
        assert_eq!(out.contents().trim_end(), expected.to_str().unwrap());
    }

    #[test]
    fn program_name_is_the_typed_command() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        std::os::unix::fs::symlink("/bin/sh", bin.join("sh")).unwrap();
        let env = env_with_path(tmp.path(), &[&bin]);

        let location = resolve(&env, "sh").unwrap();
        let mut out = MemWriter::new();
        let mut err = MemWriter::new();
        ExternalCommand::new(
            "sh".into(),
            location,
            vec!["-c".into(), "echo $0".into()],
        )
        .execute(&mut out, &mut err, &env)
        .unwrap();
        assert_eq!(out.contents(), "sh\n");
    }

    #[test]
    fn signal_death_maps_to_128_plus_signal() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        write_script(&bin, "suicide", "kill -9 $$", 0o755);
        let env = env_with_path(tmp.path(), &[&bin]);

        let location = resolve(&env, "suicide").unwrap();
        let code = ExternalCommand::new("suicide".into(), location, Vec::new())
            .execute(&mut MemWriter::new(), &mut MemWriter::new(), &env)
            .unwrap();
        assert_eq!(code, 137);
    }

    #[test]
    fn launch_failure_is_not_reported_as_not_found() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        let script = write_script(&bin, "flaky", "exit 0", 0o755);
        let env = env_with_path(tmp.path(), &[&bin]);

        let location = resolve(&env, "flaky").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

        let err = ExternalCommand::new("flaky".into(), location, Vec::new())
            .execute(&mut MemWriter::new(), &mut MemWriter::new(), &env)
            .unwrap_err();
        assert!(matches!(err, ShellError::Launch { .. }), "{err:?}");
        assert_eq!(err.to_string(), "flaky: Permission denied");
    }
}
