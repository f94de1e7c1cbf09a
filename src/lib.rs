//! A small interactive command interpreter.
//!
//! A line of input goes through the [`lexer`] (quote-aware word splitting), the
//! [`parser`] (output redirection directives) and finally the [`Interpreter`],
//! which either runs one of the built-in commands or resolves and launches an
//! external program, honoring `>`, `>>`, `2>` and `2>>` redirections.
//!
//! The interpreter keeps its mutable state (working directory, variables, last
//! exit status) in an explicit [`env::Environment`] so it can be driven in
//! isolation, without a terminal, through any [`interpreter::LineSource`].

mod builtin;
pub mod command;
pub mod editor;
pub mod env;
pub mod error;
mod external;
pub mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;

pub use builtin::{Builtin, Streams};
pub use command::{ExitCode, Flow};
pub use external::{ExecutableLocation, resolve, resolve_all};
pub use interpreter::Interpreter;
pub use io_adapters::MemWriter;
