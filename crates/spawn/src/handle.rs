//! A handle to a spawned child: its taken stdio pipes, and a process-group
//! handle that can be signalled independently of `wait()`-ing on the child.

use nix::{
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use std::{
    error, fmt, io,
    process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus},
};

/// Errors related to a `Handle`.
#[derive(Debug)]
pub enum Error {
    /// A standard stream was requested that the `Spawner` did not pipe.
    NoStream,

    /// Sending a signal to the child's process group failed.
    Signal(nix::errno::Errno),

    /// Waiting on the child failed.
    Wait(io::Error),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoStream => write!(f, "requested stream was not piped during spawn"),
            Self::Signal(errno) => write!(f, "failed to signal child process group: {errno}"),
            Self::Wait(e) => write!(f, "failed to wait on child: {e}"),
        }
    }
}
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Signal(errno) => Some(errno),
            Self::Wait(e) => Some(e),
            Self::NoStream => None,
        }
    }
}

/// A lightweight, `Copy` handle to a child's process group.
///
/// Kept separate from `Handle` so a signal watcher thread can hold one
/// while the main thread still owns (and eventually consumes, via `wait`)
/// the `Handle` itself.
#[derive(Clone, Copy, Debug)]
pub struct ProcessGroup(Pid);
impl ProcessGroup {
    pub(super) fn new(pid: Pid) -> Self {
        Self(pid)
    }

    /// Send a signal to every process in the child's group.
    pub fn signal(&self, signal: Signal) -> Result<(), Error> {
        killpg(self.0, signal).map_err(Error::Signal)
    }
}

/// A handle to a child process created via `Spawner::spawn()`.
///
/// The child's own process group (distinct from the parent's) lets the
/// caller forward a signal to the whole group without racing the shell it
/// may have spawned grandchildren through.
pub struct Handle {
    child: Child,
    group: ProcessGroup,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}
impl Handle {
    pub(super) fn new(child: Child) -> Self {
        let group = ProcessGroup::new(Pid::from_raw(child.id() as i32));
        Self {
            child,
            group,
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    pub(super) fn take_stdio(
        &mut self,
        stdin: Option<ChildStdin>,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
    ) {
        self.stdin = stdin;
        self.stdout = stdout;
        self.stderr = stderr;
    }

    /// The OS process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// A `Copy`-able handle to the child's process group, for signalling.
    pub fn group(&self) -> ProcessGroup {
        self.group
    }

    /// Take the child's standard input, if it was piped.
    pub fn stdin(&mut self) -> Result<ChildStdin, Error> {
        self.stdin.take().ok_or(Error::NoStream)
    }

    /// Take the child's standard output, if it was piped.
    pub fn stdout(&mut self) -> Result<ChildStdout, Error> {
        self.stdout.take().ok_or(Error::NoStream)
    }

    /// Take the child's standard error, if it was piped.
    pub fn stderr(&mut self) -> Result<ChildStderr, Error> {
        self.stderr.take().ok_or(Error::NoStream)
    }

    /// Block until the child exits, returning its exit status.
    pub fn wait(mut self) -> Result<ExitStatus, Error> {
        self.child.wait().map_err(Error::Wait)
    }
}
