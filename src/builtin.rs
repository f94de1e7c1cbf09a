use crate::command::{ExitCode, Flow, OutputStream};
use crate::env::Environment;
use crate::error::describe;
use crate::external::{resolve, resolve_all};
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env as stdenv;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

/// Streams a builtin reads from and writes to for one invocation.
///
/// `stdout` and `stderr` are either the interpreter's own streams or the
/// files named by redirections.
pub struct Streams<'a> {
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn OutputStream,
    pub stderr: &'a mut dyn OutputStream,
}

/// Commands implemented by the interpreter itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
    Cat,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Exit,
        Builtin::Echo,
        Builtin::Type,
        Builtin::Pwd,
        Builtin::Cd,
        Builtin::Cat,
    ];

    /// Canonical name of the command, e.g. "echo" or "cd".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exit => "exit",
            Builtin::Echo => "echo",
            Builtin::Type => "type",
            Builtin::Pwd => "pwd",
            Builtin::Cd => "cd",
            Builtin::Cat => "cat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    /// Runs the builtin in-process.
    ///
    /// Errors are reserved for failures writing to the streams themselves;
    /// everything the user did wrong is reported on `stderr` and reflected in
    /// the returned status.
    pub fn execute(
        self,
        args: &[String],
        io: &mut Streams<'_>,
        env: &mut Environment,
    ) -> Result<Flow> {
        let name = self.name();
        match self {
            Builtin::Exit => exit(args, io),
            Builtin::Echo => echo(args, io).map(Flow::Continue),
            Builtin::Type => run_parsed::<Type>(name, args, io, env).map(Flow::Continue),
            Builtin::Pwd => run_parsed::<Pwd>(name, args, io, env).map(Flow::Continue),
            Builtin::Cd => run_parsed::<Cd>(name, args, io, env).map(Flow::Continue),
            Builtin::Cat => run_parsed::<Cat>(name, args, io, env).map(Flow::Continue),
        }
    }
}

/// Builtins whose arguments are parsed with [`argh`].
trait BuiltinCommand: Sized + FromArgs {
    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode>;
}

fn run_parsed<T: BuiltinCommand>(
    name: &str,
    args: &[String],
    io: &mut Streams<'_>,
    env: &mut Environment,
) -> Result<ExitCode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[name], &args) {
        Ok(cmd) => cmd.execute(io, env),
        // `--help` lands here with a successful status.
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                writeln!(io.stdout, "{}", output.trim_end())?;
                Ok(0)
            }
            Err(()) => {
                writeln!(io.stderr, "{name}: {}", output.trim_end())?;
                Ok(1)
            }
        },
    }
}

/// `exit [n]`. Not parsed with argh so that negative codes are accepted.
fn exit(args: &[String], io: &mut Streams<'_>) -> Result<Flow> {
    match args {
        [] => Ok(Flow::Exit(0)),
        [code] => match code.parse::<ExitCode>() {
            Ok(code) => Ok(Flow::Exit(code)),
            Err(_) => {
                writeln!(io.stderr, "exit: {code}: numeric argument required")?;
                Ok(Flow::Exit(2))
            }
        },
        _ => {
            writeln!(io.stderr, "exit: too many arguments")?;
            Ok(Flow::Continue(1))
        }
    }
}

/// `echo args...`: arguments are printed verbatim, so `echo --help` prints `--help`.
fn echo(args: &[String], io: &mut Streams<'_>) -> Result<ExitCode> {
    writeln!(io.stdout, "{}", args.join(" "))?;
    Ok(0)
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
struct Pwd {}

impl BuiltinCommand for Pwd {
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        writeln!(io.stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or starting with `~`.
    target: Option<String>,
}

impl Cd {
    /// The requested directory with `~` expanded, or `None` when HOME is needed but unset.
    fn destination(&self, env: &Environment) -> Option<PathBuf> {
        match self.target.as_deref() {
            None | Some("") | Some("~") => env.home_dir(),
            Some(t) => match t.strip_prefix("~/") {
                Some(rest) => env.home_dir().map(|home| home.join(rest)),
                None => Some(PathBuf::from(t)),
            },
        }
    }
}

impl BuiltinCommand for Cd {
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let Some(target) = self.destination(env) else {
            writeln!(io.stderr, "cd: HOME not set")?;
            return Ok(1);
        };
        let new_dir = env.current_dir.join(&target);

        let changed = fs::metadata(&new_dir).and_then(|metadata| {
            if !metadata.is_dir() {
                return Err(io::Error::from(io::ErrorKind::NotADirectory));
            }
            let canonical = fs::canonicalize(&new_dir)?;
            stdenv::set_current_dir(&canonical)?;
            Ok(canonical)
        });

        match changed {
            Ok(canonical) => {
                let previous = std::mem::replace(&mut env.current_dir, canonical);
                env.set_var("OLDPWD", previous.to_string_lossy());
                env.set_var("PWD", env.current_dir.to_string_lossy().into_owned());
                Ok(0)
            }
            Err(e) => {
                writeln!(io.stderr, "cd: {}: {}", target.display(), describe(&e))?;
                Ok(1)
            }
        }
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted if used as a command.
struct Type {
    #[argh(switch, short = 'a')]
    /// list every match: the builtin and all executables found on PATH.
    all: bool,

    #[argh(positional, greedy)]
    /// command names to look up.
    names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.names.is_empty() {
            writeln!(io.stderr, "type: usage: type [-a] name [name ...]")?;
            return Ok(2);
        }

        let mut status = 0;
        for name in &self.names {
            let mut found = false;
            if Builtin::from_name(name).is_some() {
                writeln!(io.stdout, "{name} is a shell builtin")?;
                found = true;
            }
            if self.all {
                for location in resolve_all(env, name) {
                    writeln!(io.stdout, "{name} is {}", location.path().display())?;
                    found = true;
                }
            } else if !found {
                if let Some(location) = resolve(env, name) {
                    writeln!(io.stdout, "{name} is {}", location.path().display())?;
                    found = true;
                }
            }
            if !found {
                writeln!(io.stderr, "{name}: not found")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Print file(s) to standard output, one after another.
struct Cat {
    #[argh(positional, greedy)]
    /// files to print, in order; standard input is copied when none are given.
    files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.files.is_empty() {
            io::copy(&mut *io.stdin, &mut *io.stdout).context("cat: write error")?;
            return Ok(0);
        }

        let mut status = 0;
        for name in &self.files {
            if let Err(e) = copy_file(env, name, &mut *io.stdout)? {
                writeln!(io.stderr, "cat: {name}: {}", describe(&e))?;
                status = 1;
            }
        }
        Ok(status)
    }
}

/// Copy one file to `out`.
///
/// The outer error is a failure to write, which aborts `cat`; the inner one
/// is a failure to open or read this particular file.
fn copy_file(
    env: &Environment,
    name: &str,
    out: &mut dyn OutputStream,
) -> Result<io::Result<()>> {
    let mut file = match File::open(env.current_dir.join(name)) {
        Ok(file) => file,
        Err(e) => return Ok(Err(e)),
    };
    let mut buf = [0u8; 8192];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => return Ok(Ok(())),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Ok(Err(e)),
        };
        out.write_all(&buf[..n]).context("cat: write error")?;
    }
}
