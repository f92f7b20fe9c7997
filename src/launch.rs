//! fork + exec of a single child with its stream bindings installed.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;

use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::unistd::{close, dup2, execvpe, fork, getpid, setpgid, ForkResult, Pid};
use tracing::debug;

use crate::command::CommandSpec;
use crate::error::{Result, ShellError};
use crate::redirect::StreamBindings;

/// Environment variable carrying the shell's working directory at launch.
pub const PARENT_VAR: &str = "parent";

/// What the child does with SIGINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptDisposition {
    /// The shell decides whether an interrupt reaches the child.
    Ignore,
    /// The terminal delivers Ctrl-C straight to the child's group.
    Default,
}

/// Process group and signal setup for one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Group to join; `None` makes the child a new group leader.
    pub group: Option<Pid>,
    pub interrupt: InterruptDisposition,
}

impl Placement {
    pub fn leader(interrupt: InterruptDisposition) -> Self { Placement { group: None, interrupt } }
    pub fn join(self, pgid: Pid) -> Self { Placement { group: Some(pgid), ..self } }
}

pub trait Launch {
    /// Start `command` and return its pid without waiting. `bindings` is
    /// consumed so the parent's copies are closed as soon as the child exists.
    fn launch(&mut self, command: &CommandSpec, bindings: StreamBindings, placement: Placement) -> Result<Pid>;
}

/// The real launcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkExec;

/// Everything the child needs, built before fork so the child only makes
/// raw syscalls.
struct Prepared {
    argv: Vec<CString>,
    envp: Vec<CString>,
    not_found: Vec<u8>,
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
}

impl Prepared {
    fn new(command: &CommandSpec, bindings: &StreamBindings) -> Result<Self> {
        let argv = command.argv().iter().map(|a| CString::new(a.as_str())).collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Prepared {
            argv,
            envp: child_environment()?,
            not_found: format!("wish: command not found: {}\n", command.program()).into_bytes(),
            stdin: bindings.stdin.raw(),
            stdout: bindings.stdout.raw(),
        })
    }
}

/// The shell's environment plus `parent=<cwd>`.
fn child_environment() -> Result<Vec<CString>> {
    let mut envp = Vec::new();
    for (k, v) in std::env::vars_os() {
        if k == PARENT_VAR { continue; }
        let mut kv = k.as_bytes().to_vec();
        kv.push(b'=');
        kv.extend_from_slice(v.as_bytes());
        envp.push(CString::new(kv)?);
    }
    if let Ok(cwd) = std::env::current_dir() {
        let mut kv = format!("{PARENT_VAR}=").into_bytes();
        kv.extend_from_slice(cwd.as_os_str().as_bytes());
        envp.push(CString::new(kv)?);
    }
    Ok(envp)
}

impl Launch for ForkExec {
    fn launch(&mut self, command: &CommandSpec, bindings: StreamBindings, placement: Placement) -> Result<Pid> {
        let prepared = Prepared::new(command, &bindings)?;
        match unsafe { fork() } {
            Err(e) => Err(ShellError::Fork(e)),
            Ok(ForkResult::Child) => exec_child(&prepared, placement),
            Ok(ForkResult::Parent { child }) => {
                // both sides set the group; whichever runs first wins the race
                let _ = setpgid(child, placement.group.unwrap_or(child));
                debug!(pid = %child, program = command.program(), pgid = ?placement.group, "launched");
                drop(bindings);
                Ok(child)
            }
        }
    }
}

/// Duplicate `fd` onto `target` and close the original.
fn install(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd != target {
        dup2(fd, target)?;
        close(fd)?;
    }
    Ok(())
}

fn exec_child(p: &Prepared, placement: Placement) -> ! {
    let _ = setpgid(Pid::from_raw(0), placement.group.unwrap_or(Pid::from_raw(0)));
    let int = match placement.interrupt { InterruptDisposition::Ignore => SigHandler::SigIgn, InterruptDisposition::Default => SigHandler::SigDfl };
    unsafe {
        let _ = signal(Signal::SIGINT, int);
        // SIGTSTP keeps the shell's disposition: jobs cannot be suspended
        for sig in [Signal::SIGQUIT, Signal::SIGTTIN, Signal::SIGTTOU, Signal::SIGCHLD] {
            let _ = signal(sig, SigHandler::SigDfl);
        }
    }
    let wired = p.stdin.map_or(Ok(()), |fd| install(fd, libc::STDIN_FILENO))
        .and_then(|_| p.stdout.map_or(Ok(()), |fd| install(fd, libc::STDOUT_FILENO)));
    if wired.is_ok() {
        let _ = execvpe(&p.argv[0], &p.argv, &p.envp);
    }
    // exec failed: report and die without touching any shell state
    unsafe { libc::write(libc::STDERR_FILENO, p.not_found.as_ptr() as *const libc::c_void, p.not_found.len()) };
    let _ = kill(getpid(), Signal::SIGTERM);
    unsafe { libc::_exit(127) }
}
