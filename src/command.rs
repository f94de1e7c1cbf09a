use std::fs::File;
use std::io::{self, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// What the read-eval loop should do after a command has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep prompting. Carries the status of the command that just ran.
    Continue(ExitCode),
    /// Stop the loop and end the process with the given code.
    Exit(ExitCode),
}

impl Flow {
    /// Status carried by either variant.
    pub fn code(self) -> ExitCode {
        match self {
            Flow::Continue(code) | Flow::Exit(code) => code,
        }
    }
}

/// Abstraction over a writable output stream that may also be handed to a
/// spawned child process.
///
/// Builtins only ever see the [`Write`] half. External commands ask for
/// [`OutputStream::stdio`]; a stream that returns `None` (an in-memory buffer,
/// for instance) gets the child's output piped back and copied into it.
pub trait OutputStream: Write {
    /// Convert this output into a [`Stdio`] handle for `std::process::Command`.
    fn stdio(&mut self) -> io::Result<Option<Stdio>>;
}

impl OutputStream for io::Stdout {
    fn stdio(&mut self) -> io::Result<Option<Stdio>> {
        // Anything a builtin buffered must reach the terminal before the child writes.
        self.flush()?;
        Ok(Some(Stdio::inherit()))
    }
}

impl OutputStream for io::Stderr {
    fn stdio(&mut self) -> io::Result<Option<Stdio>> {
        self.flush()?;
        Ok(Some(Stdio::inherit()))
    }
}

impl OutputStream for File {
    fn stdio(&mut self) -> io::Result<Option<Stdio>> {
        Ok(Some(self.try_clone()?.into()))
    }
}

impl<T: OutputStream + ?Sized> OutputStream for &mut T {
    fn stdio(&mut self) -> io::Result<Option<Stdio>> {
        (**self).stdio()
    }
}
