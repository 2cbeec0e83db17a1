//! Build and launch a single child process.

use crate::handle::Handle;
use std::{
    error, ffi::OsString, fmt, io, os::unix::process::CommandExt, path::PathBuf,
    process::Command, process::Stdio, thread,
};

/// Errors related to spawning a child.
#[derive(Debug)]
pub enum Error {
    /// The child failed to spawn (binary missing, permission denied, ...).
    Spawn(io::Error),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn child: {e}"),
        }
    }
}
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
        }
    }
}

/// How the child's standard input should be set up.
#[derive(Default)]
pub enum StreamMode {
    /// No input; `/dev/null`.
    #[default]
    Null,

    /// Write the given bytes to the child's stdin, then close it.
    Piped(Vec<u8>),
}

/// A builder for a single child process.
///
/// Unlike the teacher's `Spawner`, this one never resolves the program
/// through an internal PATH cache and never inherits the parent's
/// environment: both `program` and `env` are supplied explicitly by the
/// caller, since the cache key must be computed from the exact values that
/// end up in the child's environment.
pub struct Spawner {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    stdin: StreamMode,
}
impl Spawner {
    /// Start building a spawn of `program`, resolved exactly as given
    /// (absolute path or a bare name looked up on `$PATH` by the OS loader).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: StreamMode::default(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a single environment variable. The environment is otherwise
    /// empty: nothing is inherited from the parent.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set how the child's standard input is fed.
    pub fn stdin(mut self, mode: StreamMode) -> Self {
        self.stdin = mode;
        self
    }

    /// Spawn the child. Standard output and standard error are always
    /// piped: callers that don't want to capture one can simply drain and
    /// discard it.
    ///
    /// The child is placed in a new process group (`setpgid(0, 0)` inside
    /// the child, via `process_group(0)`) so that a signal can be
    /// forwarded to the whole group independently of the parent's own
    /// group, and so that a shell invoked as the child doesn't share a
    /// group with `runcached` itself.
    pub fn spawn(self) -> Result<Handle, Error> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_clear()
            .envs(self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        command.stdin(match &self.stdin {
            StreamMode::Null => Stdio::null(),
            StreamMode::Piped(_) => Stdio::piped(),
        });

        let mut child = command.spawn().map_err(Error::Spawn)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        if let (StreamMode::Piped(bytes), Some(mut pipe)) = (self.stdin, stdin) {
            thread::spawn(move || {
                use io::Write;
                let _ = pipe.write_all(&bytes);
            });
        }

        let mut handle = Handle::new(child);
        handle.take_stdio(None, stdout, stderr);
        Ok(handle)
    }
}
