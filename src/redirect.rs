//! Stream endpoints for a child about to be launched, and the scoped stdout
//! override used when a builtin's output goes to a file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::unistd::dup2;
use tracing::debug;

use crate::command::{CommandSpec, RedirectionSpec};
use crate::error::{Result, ShellError};

/// Output files are private to the user who ran the command.
pub const OUTPUT_MODE: u32 = 0o600;

/// Where one standard stream of a child comes from or goes to.
#[derive(Debug, Default)]
pub enum Endpoint {
    /// Inherited from the shell, normally the terminal.
    #[default]
    Terminal,
    File(OwnedFd),
    Pipe(OwnedFd),
}

impl Endpoint {
    pub fn raw(&self) -> Option<RawFd> {
        match self { Endpoint::Terminal => None, Endpoint::File(fd) | Endpoint::Pipe(fd) => Some(fd.as_raw_fd()) }
    }
    pub fn is_terminal(&self) -> bool { matches!(self, Endpoint::Terminal) }
}

/// Stdin/stdout for one child. Dropping it closes the parent's copies.
#[derive(Debug, Default)]
pub struct StreamBindings { pub stdin: Endpoint, pub stdout: Endpoint }

impl StreamBindings {
    pub fn inherit() -> Self { StreamBindings::default() }
}

pub fn open_input(path: &Path) -> Result<OwnedFd> {
    File::open(path).map(OwnedFd::from).map_err(|e| ShellError::redirect(path, e))
}

/// Create or truncate, write-only, mode 0600.
pub fn open_output(path: &Path) -> Result<OwnedFd> {
    OpenOptions::new().write(true).create(true).truncate(true).mode(OUTPUT_MODE).open(path)
        .map(OwnedFd::from).map_err(|e| ShellError::redirect(path, e))
}

/// Open every redirection target up front, so a missing or unreadable file
/// stops the command before a process exists.
pub fn resolve(command: &CommandSpec, redirection: &RedirectionSpec) -> Result<StreamBindings> {
    let mut bindings = StreamBindings::inherit();
    if let Some(path) = &redirection.input { bindings.stdin = Endpoint::File(open_input(path)?); }
    if let Some(path) = &redirection.output { bindings.stdout = Endpoint::File(open_output(path)?); }
    debug!(program = command.program(), stdin = ?bindings.stdin.raw(), stdout = ?bindings.stdout.raw(), "resolved stream bindings");
    Ok(bindings)
}

/// Swaps the shell's own fd 1 for a file until dropped.
pub struct StdoutOverride { saved: OwnedFd }

impl StdoutOverride {
    pub fn install(target: OwnedFd) -> Result<Self> {
        io::stdout().flush()?;
        let saved = io::stdout().as_fd().try_clone_to_owned()?;
        dup2(target.as_raw_fd(), libc::STDOUT_FILENO)?;
        Ok(StdoutOverride { saved })
    }
}

impl Drop for StdoutOverride {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Err(e) = dup2(self.saved.as_raw_fd(), libc::STDOUT_FILENO) { eprintln!("wish: could not restore stdout: {e}"); }
    }
}

/// Run `f` with stdout sent to `path` (if any), restoring it afterwards.
pub fn with_stdout_to<T>(path: Option<&Path>, f: impl FnOnce() -> T) -> Result<T> {
    let _guard = match path { Some(p) => Some(StdoutOverride::install(open_output(p)?)?), None => None };
    Ok(f())
}
