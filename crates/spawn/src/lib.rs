//! Spawn a single child process with an exact environment and piped
//! stdin/stdout/stderr.
//!
//! This is a trimmed descendant of a fork/exec-based process spawner: the
//! original dealt with namespaces, capabilities and SECCOMP policies for
//! sandboxing a child. None of that applies here, so spawning goes through
//! `std::process::Command` and the surface is reduced to what a cache-and-replay
//! runner needs: an exact (non-inherited) environment, full control of the
//! three standard streams, and a process-group handle that can be signalled
//! independently of waiting on the child.

mod handle;
mod spawn;

pub use handle::{Error as HandleError, Handle, ProcessGroup};
pub use spawn::{Error as SpawnError, Spawner, StreamMode};
