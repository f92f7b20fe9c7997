use std::io::{self, BufRead};

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

use wish::config::{Args, Config};
use wish::{DispatchOutcome, Shell};

fn init_logging(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = Config::from_env(args);
    init_logging(config.log_level);

    let mut shell = Shell::new(config.interactive).context("failed to start shell")?;
    info!(interactive = config.interactive, "wish started");

    let code = match &config.script {
        Some(script) => run_lines(&mut shell, script.lines().map(|l| Ok(l.to_string()))),
        None if config.interactive => repl(&mut shell, &config)?,
        None => run_lines(&mut shell, io::stdin().lock().lines()),
    };
    debug!(code, "wish exiting");
    std::process::exit(code);
}

/// Run lines one after another; used for `-c` and piped input.
fn run_lines(shell: &mut Shell, lines: impl Iterator<Item = io::Result<String>>) -> i32 {
    for line in lines {
        shell.poll();
        let line = match line {
            Ok(l) => l,
            Err(e) => { eprintln!("wish: read error: {e}"); return 1; }
        };
        if let DispatchOutcome::Exit(code) = shell.execute(&line) { return code; }
    }
    shell.poll();
    shell.last_status()
}

fn repl(shell: &mut Shell, config: &Config) -> Result<i32> {
    let mut rl = DefaultEditor::new().context("failed to open line editor")?;
    let mut suppress = false;
    loop {
        shell.poll();
        let prompt = if suppress { String::new() } else { prompt(config) };
        suppress = false;
        match rl.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() { let _ = rl.add_history_entry(line.as_str()); }
                match shell.execute(&line) {
                    DispatchOutcome::Continue => {}
                    DispatchOutcome::ContinueSuppressPrompt => suppress = true,
                    DispatchOutcome::Exit(code) => return Ok(code),
                }
            }
            // the line editor swallowed Ctrl-C with nothing running
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(shell.last_status()),
            Err(e) => return Err(e).context("failed to read line"),
        }
    }
}

/// `user@host cwd > `, unless WISH_PROMPT overrides it.
fn prompt(config: &Config) -> String {
    if let Some(p) = &config.prompt { return p.clone(); }
    let user = std::env::var("USER").unwrap_or_else(|_| "user".into());
    let host = nix::unistd::gethostname().map(|h| h.to_string_lossy().into_owned()).unwrap_or_else(|_| "localhost".into());
    let cwd = std::env::current_dir().map(|d| d.display().to_string()).unwrap_or_else(|_| "?".into());
    format!("{user}@{host} {cwd} > ")
}
