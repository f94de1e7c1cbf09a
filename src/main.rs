use argh::FromArgs;
use rsh::Interpreter;
use rsh::editor::LineEditor;
use rsh::env::Environment;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// An interactive command interpreter.
#[derive(FromArgs)]
struct Args {
    /// run a single line and exit with its status
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// prompt shown before every line
    #[argh(option, default = "String::from(\"$ \")")]
    prompt: String,

    /// file to load history from and save it to on exit
    #[argh(option)]
    history: Option<PathBuf>,

    /// do not load or save history
    #[argh(switch)]
    no_history: bool,
}

impl Args {
    fn history_file(&self, env: &Environment) -> Option<PathBuf> {
        if self.no_history {
            return None;
        }
        self.history
            .clone()
            .or_else(|| env.home_dir().map(|home| home.join(".rsh_history")))
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<i32> {
    let mut sh = Interpreter::new(Environment::new());
    let (mut stdin, mut stdout, mut stderr) = (io::stdin(), io::stdout(), io::stderr());

    if let Some(line) = &args.command {
        let flow = sh.execute_line(line, &mut stdin, &mut stdout, &mut stderr);
        return Ok(flow.code());
    }

    let history_file = args.history_file(sh.env());
    let mut editor = LineEditor::new(sh.env(), history_file)?;
    let code = sh.repl(&mut editor, &args.prompt, &mut stdin, &mut stdout, &mut stderr)?;
    if let Err(e) = editor.save_history() {
        warn!(error = %e, "could not save history");
    }
    Ok(code)
}

fn main() {
    let args: Args = argh::from_env();
    init_logging();

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("rsh: {e:#}");
            1
        }
    };
    debug!(code, "exiting");
    std::process::exit(code);
}
