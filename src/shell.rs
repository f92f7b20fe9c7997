//! The dispatcher: one input line in, one [`DispatchOutcome`] out.

use tracing::debug;

use crate::builtin::{Builtin, Flow};
use crate::command::{CommandSpec, ParsedLine, RedirectionSpec};
use crate::error::{Result, ShellError};
use crate::job::JobController;
use crate::parse;
use crate::redirect;

const USAGE: &str = "usage: cmd [args] [< in] [> out] [&]\n       cmd [args] | cmd [args] ...";

/// Status recorded for a line that failed to parse.
pub const SYNTAX_STATUS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Print the prompt and read the next line.
    Continue,
    /// An interrupt just fired; skip the next prompt.
    ContinueSuppressPrompt,
    Exit(i32),
}

pub struct Shell { jobs: JobController }

impl Shell {
    pub fn new(interactive: bool) -> Result<Self> {
        Ok(Shell { jobs: JobController::init(interactive)? })
    }

    pub fn last_status(&self) -> i32 { self.jobs.last_status() }

    /// Pick up exits the reaper collected while the shell was idle.
    pub fn poll(&mut self) { self.jobs.poll(); }

    /// Errors are reported here; the caller only ever sees continue or exit.
    pub fn execute(&mut self, line: &str) -> DispatchOutcome {
        let tokens = parse::tokenize(line);
        if tokens.is_empty() { return DispatchOutcome::Continue; }
        let parsed = match parse::parse(&tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("wish: {}\n{USAGE}", ShellError::from(e));
                self.jobs.set_last_status(SYNTAX_STATUS);
                return DispatchOutcome::Continue;
            }
        };
        debug!(?parsed, "dispatching");
        match self.dispatch(parsed) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("wish: {e}");
                self.jobs.set_last_status(1);
                DispatchOutcome::Continue
            }
        }
    }

    fn dispatch(&mut self, parsed: ParsedLine) -> Result<DispatchOutcome> {
        match parsed {
            ParsedLine::Single { command, redirection, background } => {
                if let Some(builtin) = Builtin::lookup(command.program()) {
                    return self.run_builtin(builtin, &command, &redirection);
                }
                let bindings = redirect::resolve(&command, &redirection)?;
                self.jobs.run_single(&command, bindings, background)
            }
            ParsedLine::Pipeline(spec) => self.jobs.run_pipeline(&spec),
        }
    }

    /// Builtins run synchronously in the shell; only `> file` applies to them.
    fn run_builtin(&mut self, builtin: Builtin, command: &CommandSpec, redirection: &RedirectionSpec) -> Result<DispatchOutcome> {
        let last = self.jobs.last_status();
        let flow = redirect::with_stdout_to(redirection.output.as_deref(), || builtin.run(command.args(), last))?;
        Ok(match flow {
            Flow::Exit(code) => DispatchOutcome::Exit(code),
            Flow::Status(status) => { self.jobs.set_last_status(status); DispatchOutcome::Continue }
        })
    }
}
