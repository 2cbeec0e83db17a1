//! Resolve a binary name against `$PATH`.
//!
//! The teacher's version of this crate cached lookups in a `dashmap` and
//! resolved them in parallel with `rayon`, worth it when a shell
//! integration re-resolves the same handful of binaries on every prompt.
//! `runcached` resolves at most one path per invocation (the shell, or the
//! command itself when it has no slash in it), so neither the cache nor
//! the parallelism pays for itself; a sequential scan of `$PATH` is all
//! that's needed.

use std::{env, path::Path, path::PathBuf};

/// Errors when trying to resolve a path.
#[derive(Debug)]
pub enum Error {
    /// The binary could not be found in `$PATH`.
    NotFound(String),
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(e) => write!(f, "could not find {e} in PATH"),
        }
    }
}
impl std::error::Error for Error {}

/// Resolve `name` against `$PATH`.
///
/// A name containing a path separator (e.g. `./run.sh`, `/bin/sh`) is
/// returned as-is if it exists, without consulting `$PATH`, mirroring how
/// `execvp(3)` treats such names.
pub fn which(name: &str) -> Result<PathBuf, Error> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if candidate.exists() {
            Ok(candidate.to_path_buf())
        } else {
            Err(Error::NotFound(name.to_string()))
        };
    }

    env::var_os("PATH")
        .iter()
        .flat_map(env::split_paths)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::NotFound(name.to_string()))
}
