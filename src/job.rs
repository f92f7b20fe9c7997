//! Jobs, terminal ownership and the two asynchronous events the shell reacts
//! to: a child exiting and the user asking for an interrupt.

use std::io;
use std::os::fd::AsFd;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use nix::errno::Errno;
use nix::sys::signal::{killpg, signal, SigHandler, Signal};
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp, Pid};
use signal_hook::consts::{SIGCHLD, SIGINT};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};

use crate::command::{CommandSpec, PipelineSpec};
use crate::error::{Result, ShellError};
use crate::launch::{ForkExec, InterruptDisposition, Launch, Placement};
use crate::pipeline::build_pipeline;
use crate::redirect::StreamBindings;
use crate::shell::DispatchOutcome;

/// Environment variable the shell sets to `wish <cwd>` at startup.
pub const SHELL_VAR: &str = "shell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState { Launching, Foreground, Background, Reaped }

/// A reaped child and its exit code: the code itself, or 128 + signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    pub pid: Pid,
    pub code: i32,
    /// Died from SIGINT, i.e. Ctrl-C on a terminal it owned.
    pub by_interrupt: bool,
}

impl Exit {
    pub fn from_status(ws: WaitStatus) -> Option<Self> {
        match ws {
            WaitStatus::Exited(pid, code) => Some(Exit { pid, code, by_interrupt: false }),
            WaitStatus::Signaled(pid, sig, _) => Some(Exit { pid, code: 128 + sig as i32, by_interrupt: sig == Signal::SIGINT }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event { ChildExited(Exit), InterruptRequested }

/// Non-blocking sweep: collect every child that has exited so far.
pub fn sweep() -> Vec<Exit> {
    let mut exits = Vec::new();
    loop {
        let ws = match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Err(Errno::EINTR) => continue,
            Err(e) => { warn!(error = %e, "waitpid failed"); break; }
            Ok(ws) => ws,
        };
        if let Some(exit) = Exit::from_status(ws) {
            debug!(pid = %exit.pid, status = exit.code, "reaped child");
            exits.push(exit);
        }
    }
    exits
}

/// Start the thread that owns the signal iterator. Every SIGCHLD is answered
/// with a sweep right away, whatever the main thread is blocked on; the
/// results and any interrupts arrive on the returned channel.
pub fn spawn_reaper() -> Result<Receiver<Event>> {
    let mut signals = Signals::new([SIGCHLD, SIGINT]).map_err(ShellError::Signal)?;
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("wish-reaper".into())
        .spawn(move || {
            for sig in signals.forever() {
                let events = match sig {
                    SIGCHLD => sweep().into_iter().map(Event::ChildExited).collect(),
                    SIGINT => vec![Event::InterruptRequested],
                    _ => Vec::new(),
                };
                for event in events {
                    if tx.send(event).is_err() { return; }
                }
            }
        })
        .map_err(ShellError::Signal)?;
    Ok(rx)
}

/// One pipeline invocation: a process group led by its first process.
#[derive(Debug)]
pub struct Job {
    pids: Vec<Pid>,
    live: Vec<Pid>,
    state: JobState,
    owns_terminal: bool,
    announce: bool,
    status: Option<i32>,
    interrupted: bool,
}

impl Job {
    /// `pids` in pipeline order; must not be empty.
    pub fn new(pids: Vec<Pid>) -> Self {
        debug_assert!(!pids.is_empty());
        Job { live: pids.clone(), pids, state: JobState::Launching, owns_terminal: false, announce: false, status: None, interrupted: false }
    }
    pub fn leader(&self) -> Pid { self.pids[0] }
    /// The process whose exit ends a foreground wait: the last stage.
    pub fn representative(&self) -> Pid { self.pids[self.pids.len() - 1] }
    pub fn state(&self) -> JobState { self.state }
    pub fn status(&self) -> Option<i32> { self.status }
    pub fn is_finished(&self) -> bool { self.live.is_empty() }

    /// Clear terminal ownership, returning whether the job held it.
    pub fn release_terminal(&mut self) -> bool { std::mem::replace(&mut self.owns_terminal, false) }

    /// Note that a member exited. Returns false if the pid is not one of ours.
    pub fn record(&mut self, exit: Exit) -> bool {
        let Some(at) = self.live.iter().position(|p| *p == exit.pid) else { return false };
        self.live.swap_remove(at);
        if exit.pid == self.representative() {
            self.status = Some(exit.code);
            self.interrupted = exit.by_interrupt;
        }
        if self.live.is_empty() && self.state == JobState::Background { self.state = JobState::Reaped; }
        true
    }
}

/// Process-wide shell facts, set once at startup.
pub struct ShellState {
    pub pid: Pid,
    pub pgid: Pid,
    pub interactive: bool,
    pub tmodes: Option<Termios>,
    /// Leader of the job currently in the foreground, the target of interrupts.
    pub foreground: Option<Pid>,
}

impl ShellState {
    /// Take ownership of the terminal when interactive. Fails if the shell
    /// is not in the foreground or cannot lead its own process group.
    pub fn init(interactive: bool) -> Result<Self> {
        let pid = getpid();
        let mut state = ShellState { pid, pgid: getpgrp(), interactive, tmodes: None, foreground: None };
        if interactive {
            let stdin = io::stdin();
            if tcgetpgrp(stdin.as_fd()).map_err(ShellError::Terminal)? != state.pgid { return Err(ShellError::NotForeground); }
            for sig in [Signal::SIGTTOU, Signal::SIGTTIN, Signal::SIGTSTP, Signal::SIGQUIT] {
                unsafe { signal(sig, SigHandler::SigIgn) }?;
            }
            if state.pgid != pid { setpgid(pid, pid).map_err(|_| ShellError::NotGroupLeader)?; }
            state.pgid = getpgrp();
            if state.pgid != pid { return Err(ShellError::NotGroupLeader); }
            tcsetpgrp(stdin.as_fd(), state.pgid).map_err(ShellError::Terminal)?;
            state.tmodes = Some(tcgetattr(stdin.as_fd()).map_err(ShellError::Terminal)?);
        }
        if let Ok(cwd) = std::env::current_dir() { std::env::set_var(SHELL_VAR, format!("wish {}", cwd.display())); }
        debug!(pid = %state.pid, pgid = %state.pgid, interactive, "shell state initialised");
        Ok(state)
    }
}

/// Owns the job table and every foreground/background transition.
pub struct JobController {
    state: ShellState,
    jobs: Vec<Job>,
    events: Receiver<Event>,
    launcher: ForkExec,
    last_status: i32,
}

impl JobController {
    pub fn init(interactive: bool) -> Result<Self> {
        let state = ShellState::init(interactive)?;
        // the reaper is running before the first fork so no exit can go unnoticed
        let events = spawn_reaper()?;
        Ok(Self::with_events(state, events))
    }

    fn with_events(state: ShellState, events: Receiver<Event>) -> Self {
        JobController { state, jobs: Vec::new(), events, launcher: ForkExec, last_status: 0 }
    }

    pub fn last_status(&self) -> i32 { self.last_status }
    pub fn set_last_status(&mut self, status: i32) { self.last_status = status; }

    /// Children ignore SIGINT unless the terminal will deliver it to them directly.
    fn child_interrupt(&self, background: bool) -> InterruptDisposition {
        if self.state.interactive && !background { InterruptDisposition::Default } else { InterruptDisposition::Ignore }
    }

    pub fn run_single(&mut self, command: &CommandSpec, bindings: StreamBindings, background: bool) -> Result<DispatchOutcome> {
        let placement = Placement::leader(self.child_interrupt(background));
        let pid = self.launcher.launch(command, bindings, placement)?;
        Ok(self.settle(Job::new(vec![pid]), background))
    }

    pub fn run_pipeline(&mut self, spec: &PipelineSpec) -> Result<DispatchOutcome> {
        let interrupt = self.child_interrupt(false);
        let job = build_pipeline(spec, &mut self.launcher, interrupt)?;
        Ok(self.settle(job, false))
    }

    fn settle(&mut self, mut job: Job, background: bool) -> DispatchOutcome {
        let leader = job.leader();
        if background {
            job.state = JobState::Background;
            job.announce = true;
            println!("Process created with PID: {leader}");
            self.jobs.push(job);
            return DispatchOutcome::Continue;
        }
        // recorded before any queued interrupt is looked at
        job.state = JobState::Foreground;
        self.state.foreground = Some(leader);
        if self.state.interactive {
            match tcsetpgrp(io::stdin().as_fd(), leader) {
                Ok(()) => {
                    job.owns_terminal = true;
                    // a child that touched the tty before the hand-off is stopped on SIGTTIN
                    let _ = killpg(leader, Signal::SIGCONT);
                }
                Err(e) => warn!(%leader, error = %e, "could not hand terminal to job"),
            }
        }
        self.jobs.push(job);
        self.wait_foreground(leader)
    }

    fn foreground_done(&self, leader: Pid) -> bool {
        self.jobs.iter().find(|j| j.leader() == leader).map_or(true, |j| j.status.is_some())
    }

    fn wait_foreground(&mut self, leader: Pid) -> DispatchOutcome {
        let mut forwarded = false;
        while !self.foreground_done(leader) {
            match self.events.recv() {
                Ok(event) => forwarded |= self.handle(event),
                Err(_) => { warn!(%leader, "reaper thread is gone, giving up on foreground job"); break; }
            }
        }
        self.finish_foreground(leader, forwarded)
    }

    fn finish_foreground(&mut self, leader: Pid, forwarded: bool) -> DispatchOutcome {
        self.state.foreground = None;
        let Some(at) = self.jobs.iter().position(|j| j.leader() == leader) else { return DispatchOutcome::Continue };
        if self.jobs[at].release_terminal() { self.reclaim_terminal(); }
        let job = &mut self.jobs[at];
        let status = job.status.unwrap_or(0);
        let by_terminal = job.interrupted;
        if job.is_finished() {
            job.state = JobState::Reaped;
            self.jobs.remove(at);
        } else {
            // earlier stages still running; later sweeps collect them
            job.state = JobState::Background;
        }
        self.last_status = status;
        debug!(%leader, status, forwarded, by_terminal, "foreground job done");
        if by_terminal && !forwarded && self.state.interactive { println!(); }
        if forwarded || by_terminal { DispatchOutcome::ContinueSuppressPrompt } else { DispatchOutcome::Continue }
    }

    fn reclaim_terminal(&self) {
        let stdin = io::stdin();
        if let Err(e) = tcsetpgrp(stdin.as_fd(), self.state.pgid) { warn!(error = %e, "could not take back the terminal"); }
        if let Some(t) = &self.state.tmodes {
            if let Err(e) = tcsetattr(stdin.as_fd(), SetArg::TCSADRAIN, t) { warn!(error = %e, "could not restore terminal modes"); }
        }
    }

    /// Send SIGTERM to the foreground job's group. Returns whether anyone was signalled.
    fn forward_interrupt(&mut self) -> bool {
        let Some(leader) = self.state.foreground else {
            if self.state.interactive { println!(); }
            return false;
        };
        match killpg(leader, Signal::SIGTERM) {
            Ok(()) => {
                info!(%leader, "forwarded interrupt");
                println!("\nProcess {leader} received SIGINT");
                true
            }
            Err(e) => { debug!(%leader, error = %e, "interrupt target already gone"); false }
        }
    }

    /// Apply one event. Returns whether an interrupt was forwarded.
    fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::ChildExited(exit) => {
                if !self.jobs.iter_mut().any(|j| j.record(exit)) { debug!(pid = %exit.pid, "reaped untracked child"); }
                false
            }
            Event::InterruptRequested => self.forward_interrupt(),
        }
    }

    /// Drop background jobs whose members have all been reaped.
    fn retire(&mut self) {
        let interactive = self.state.interactive;
        self.jobs.retain(|job| {
            if job.state != JobState::Reaped { return true; }
            if job.announce {
                info!(pid = %job.leader(), status = ?job.status, "background job finished");
                if interactive { eprintln!("[{}] done", job.leader()); }
            }
            false
        });
    }

    /// Apply whatever the reaper delivered while the shell was at the prompt.
    pub fn poll(&mut self) {
        while let Ok(event) = self.events.try_recv() { self.handle(event); }
        self.retire();
    }
}
