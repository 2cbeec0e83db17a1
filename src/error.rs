//! The crate-wide error type, implementing the dispositions described for
//! each error kind: some abort the process with a diagnostic, some are
//! swallowed and logged, some are silently treated as a cache miss.

use std::path::PathBuf;

/// Something went wrong outside of the child's own exit status.
///
/// A non-zero exit from the child command is never represented here: it
/// is the expected, successful result of running the command, and is
/// returned as an `ExitCode` rather than an `Err`. Likewise, a corrupt
/// cache entry, a cache write failure, a cache format-version mismatch,
/// and a broken pipe on the caller's own stdout/stderr are never
/// represented here either — each of those is handled at the point it's
/// detected (treated as a miss, logged at `warn!`, or silently dropped)
/// and never propagates up as an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A CLI flag, duration string, or environment-override token could
    /// not be parsed.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// No command was given on the command line.
    #[error("no command given")]
    NoCommand,

    /// The child failed to spawn, or (in shell mode) `$SHELL` could not
    /// be resolved.
    #[error("failed to run child: {0}")]
    ChildSpawnFailed(#[source] HandleErrorOrSpawn),

    /// The cache directory could not be created or resolved.
    #[error("failed to resolve cache directory {path}: {source}")]
    CacheDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stdin participates in the key but could not be read to EOF.
    #[error("failed to read stdin: {0}")]
    StdinReadFailed(#[source] std::io::Error),
}

/// `crates/spawn` exposes two error enums (one for building/launching the
/// child, one for operations on an already-running `Handle`), plus
/// `crates/which` has its own `NotFound`; this wraps all three so
/// `exec::ChildRunner` has a single error type to report through
/// `Error::ChildSpawnFailed`.
#[derive(Debug, thiserror::Error)]
pub enum HandleErrorOrSpawn {
    #[error(transparent)]
    Spawn(#[from] spawn::SpawnError),
    #[error(transparent)]
    Handle(#[from] spawn::HandleError),
    #[error("{0} not found on PATH")]
    Which(String),
}
