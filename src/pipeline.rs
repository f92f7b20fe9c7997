//! N-stage pipelines over N-1 independently owned channels.
//!
//! Every channel end is an [`OwnedFd`] that moves into exactly one stage's
//! [`StreamBindings`]; the launcher drops the bindings right after fork, so
//! the shell never holds an end longer than the stage that needs it. Ends
//! are also close-on-exec, so a child never carries ends meant for others
//! past its exec. Together these guarantee every reader sees EOF once the
//! writers upstream of it are gone.

use std::os::fd::{AsRawFd, OwnedFd};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{pipe, Pid};
use tracing::{debug, warn};

use crate::command::PipelineSpec;
use crate::error::{Result, ShellError};
use crate::job::Job;
use crate::launch::{InterruptDisposition, Launch, Placement};
use crate::redirect::{Endpoint, StreamBindings};

/// One pipe between stage `i` and stage `i + 1`.
#[derive(Debug)]
pub struct Channel { read: Option<OwnedFd>, write: Option<OwnedFd> }

impl Channel {
    pub fn open() -> Result<Self> {
        let (r, w) = pipe().map_err(ShellError::Pipe)?;
        for fd in [&r, &w] {
            fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(ShellError::Pipe)?;
        }
        Ok(Channel { read: Some(r), write: Some(w) })
    }
    pub fn take_read(&mut self) -> Option<OwnedFd> { self.read.take() }
    pub fn take_write(&mut self) -> Option<OwnedFd> { self.write.take() }
    pub fn open_ends(&self) -> usize { self.read.is_some() as usize + self.write.is_some() as usize }
}

/// The N-1 channels of an N-stage pipeline.
#[derive(Debug)]
pub struct Channels { inner: Vec<Channel> }

impl Channels {
    pub fn allocate(stages: usize) -> Result<Self> {
        let inner = (1..stages).map(|_| Channel::open()).collect::<Result<Vec<_>>>()?;
        debug!(count = inner.len(), "allocated channels");
        Ok(Channels { inner })
    }

    pub fn open_ends(&self) -> usize { self.inner.iter().map(Channel::open_ends).sum() }

    /// Hand stage `i` its ends: the read end of channel `i-1` and the write
    /// end of channel `i`. First and last stages keep the terminal.
    pub fn bindings_for(&mut self, i: usize) -> StreamBindings {
        let mut b = StreamBindings::inherit();
        if i > 0 {
            if let Some(fd) = self.inner.get_mut(i - 1).and_then(Channel::take_read) { b.stdin = Endpoint::Pipe(fd); }
        }
        if let Some(fd) = self.inner.get_mut(i).and_then(Channel::take_write) { b.stdout = Endpoint::Pipe(fd); }
        b
    }
}

/// Launch every stage of `spec` into one process group led by the first
/// stage. On a launch failure the stages already running are terminated and
/// the error is returned; no partial job is left behind.
pub fn build_pipeline(spec: &PipelineSpec, launcher: &mut dyn Launch, interrupt: InterruptDisposition) -> Result<Job> {
    let mut channels = Channels::allocate(spec.stages().len())?;
    let mut pids: Vec<Pid> = Vec::with_capacity(spec.stages().len());
    let mut placement = Placement::leader(interrupt);
    for (i, stage) in spec.stages().iter().enumerate() {
        let bindings = channels.bindings_for(i);
        match launcher.launch(stage, bindings, placement) {
            Ok(pid) => {
                if i == 0 { placement = placement.join(pid); }
                pids.push(pid);
            }
            Err(e) => {
                if let Some(&leader) = pids.first() {
                    warn!(%leader, stage = i, "pipeline launch failed, terminating started stages");
                    let _ = killpg(leader, Signal::SIGTERM);
                }
                return Err(e);
            }
        }
    }
    debug_assert_eq!(channels.open_ends(), 0);
    Ok(Job::new(pids))
}
