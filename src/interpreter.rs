use crate::builtin::{Builtin, Streams};
use crate::command::{ExitCode, Flow, OutputStream};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::{ExternalCommand, resolve};
use crate::io_adapters::open_redirect;
use crate::lexer;
use crate::parser::{self, ParsedCommand, RedirectTarget};
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};

/// One result of asking the user for a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// The user aborted the line being edited (Ctrl-C); prompt again.
    Interrupted,
    /// No more input (Ctrl-D, or the end of a script).
    Eof,
}

/// Where the read-eval loop gets its lines from.
///
/// The interactive binary uses a `rustyline` editor; tests feed canned lines.
/// `env` is the interpreter state as of the prompt, for sources that complete
/// command names or paths.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str, env: &Environment) -> anyhow::Result<Input>;

    /// Called with every non-blank line before it is executed.
    fn add_history(&mut self, _line: &str) {}
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns an [`Environment`] and runs one command at a time:
/// a call to [`Interpreter::execute_line`] returns only once the command,
/// builtin or child process, has completed and its redirection files are
/// closed.
///
/// Example
/// ```
/// use rsh::{Flow, Interpreter, MemWriter};
/// use rsh::env::Environment;
///
/// let mut sh = Interpreter::new(Environment::new());
/// let (mut out, mut err) = (MemWriter::new(), MemWriter::new());
/// let flow = sh.execute_line("echo 'a  b' \"c d\"", &mut std::io::empty(), &mut out, &mut err);
/// assert_eq!(flow, Flow::Continue(0));
/// assert_eq!(out.contents(), "a  b c d\n");
/// ```
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// The read-eval loop.
    ///
    /// Prompts through `source` until an exit directive or end of input and
    /// returns the code the process should exit with. Blank lines and
    /// interrupted reads go straight back to the prompt.
    pub fn repl(
        &mut self,
        source: &mut dyn LineSource,
        prompt: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
    ) -> anyhow::Result<ExitCode> {
        loop {
            let line = match source.read_line(prompt, &self.env)? {
                Input::Line(line) => line,
                Input::Interrupted => continue,
                Input::Eof => {
                    debug!("end of input");
                    return Ok(0);
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            source.add_history(&line);
            if let Flow::Exit(code) = self.execute_line(&line, stdin, stdout, stderr) {
                debug!(code, "exit requested");
                return Ok(code);
            }
        }
    }

    /// Tokenize, parse and execute one raw input line.
    ///
    /// A blank line has no effect at all. A syntax error is reported on
    /// `stderr` and nothing is executed.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
    ) -> Flow {
        let tokens = lexer::split_into_tokens(line);
        debug!(?tokens, "tokenized");
        match parser::parse_command(tokens) {
            Ok(Some(cmd)) => self.execute(cmd, stdin, stdout, stderr),
            Ok(None) => Flow::Continue(self.env.last_status.unwrap_or(0)),
            Err(e) => {
                let e = ShellError::from(e);
                report(stderr, &e);
                self.env.last_status = Some(e.status());
                Flow::Continue(e.status())
            }
        }
    }

    /// Execute a parsed command and record its status.
    pub fn execute(
        &mut self,
        cmd: ParsedCommand,
        stdin: &mut dyn Read,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
    ) -> Flow {
        debug!(?cmd, "executing");
        let flow = self.execute_redirected(cmd, stdin, stdout, stderr);
        self.env.last_status = Some(flow.code());
        flow
    }

    /// Opens the redirection files, runs the command against them and closes
    /// them again. The files are dropped on every path out of this function.
    fn execute_redirected(
        &mut self,
        cmd: ParsedCommand,
        stdin: &mut dyn Read,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
    ) -> Flow {
        // stderr first, so a failure to open the stdout target is reported
        // where the user asked errors to go.
        let mut err_file = match self.open_target(cmd.stderr.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                report(stderr, &e);
                return Flow::Continue(e.status());
            }
        };
        let stderr: &mut dyn OutputStream = match err_file.as_mut() {
            Some(file) => file,
            None => stderr,
        };

        let mut out_file = match self.open_target(cmd.stdout.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                report(stderr, &e);
                close(stderr, "stderr");
                return Flow::Continue(e.status());
            }
        };
        let stdout: &mut dyn OutputStream = match out_file.as_mut() {
            Some(file) => file,
            None => stdout,
        };

        let flow = self.dispatch(&cmd.command, cmd.args, stdin, stdout, stderr);
        close(stdout, "stdout");
        close(stderr, "stderr");
        flow
    }

    fn open_target(&self, target: Option<&RedirectTarget>) -> Result<Option<File>, ShellError> {
        target
            .map(|target| {
                open_redirect(target, &self.env.current_dir).map_err(|source| {
                    ShellError::Redirect {
                        path: target.path.clone(),
                        source,
                    }
                })
            })
            .transpose()
    }

    fn dispatch(
        &mut self,
        name: &str,
        args: Vec<String>,
        stdin: &mut dyn Read,
        stdout: &mut dyn OutputStream,
        stderr: &mut dyn OutputStream,
    ) -> Flow {
        let builtin = if is_exit_directive(name, &args) {
            Some(Builtin::Exit)
        } else {
            Builtin::from_name(name)
        };

        if let Some(builtin) = builtin {
            let mut io = Streams {
                stdin,
                stdout,
                stderr,
            };
            return match builtin.execute(&args, &mut io, &mut self.env) {
                Ok(flow) => flow,
                Err(e) => {
                    report(io.stderr, format_args!("{name}: {e:#}"));
                    Flow::Continue(1)
                }
            };
        }

        let result = match resolve(&self.env, name) {
            Some(location) => {
                ExternalCommand::new(name.to_string(), location, args).execute(
                    stdout,
                    stderr,
                    &self.env,
                )
            }
            None => Err(ShellError::NotFound {
                name: name.to_string(),
            }),
        };
        match result {
            Ok(code) => Flow::Continue(code),
            Err(e) => {
                report(stderr, &e);
                Flow::Continue(e.status())
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Environment::new())
    }
}

/// A lone `0` is accepted as a synonym for `exit 0`.
fn is_exit_directive(name: &str, args: &[String]) -> bool {
    name == "0" && args.is_empty()
}

/// Writes a user-facing error. A failure to do so is only logged.
fn report(stderr: &mut dyn OutputStream, message: impl Display) {
    if let Err(e) = writeln!(stderr, "{message}") {
        warn!(error = %e, "could not report error: {message}");
    }
}

fn close(stream: &mut dyn OutputStream, label: &str) {
    if let Err(e) = stream.flush() {
        warn!(stream = label, error = %e, "flush failed");
    }
}
