//! Resolves the on-disk cache root and the cache format-version marker.

use crate::error::Error;
use std::{fs, path::Path, path::PathBuf};

/// Bumped whenever `fingerprint`'s canonical encoding or `cache`'s
/// on-disk record layout changes incompatibly. A stored cache whose
/// `version` file doesn't match this is treated as empty (`spec.md §6`,
/// `§7` `VersionMismatch`).
pub const FORMAT_VERSION: u32 = 2;

const VERSION_FILE: &str = "version";

/// The platform's user-cache directory, joined with `runcached`. Falls
/// back to `$TMPDIR` (or `/tmp`) if the platform has no cache directory
/// (e.g. `$HOME` unset in a minimal container).
pub fn cache_root() -> Result<PathBuf, Error> {
    let root = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("runcached");
    fs::create_dir_all(&root).map_err(|source| Error::CacheDirUnavailable {
        path: root.clone(),
        source,
    })?;
    ensure_version(&root)?;
    Ok(root)
}

/// Read the version marker, resetting the cache directory's contents if
/// it is absent or stale. Entries are left on disk for the caller to
/// ignore (`cache::CacheStore` only ever reads entries it can name by
/// fingerprint, so stale-version files are simply never looked up again)
/// rather than being proactively deleted, matching `spec.md §4.4`'s "need
/// not be proactively deleted" latitude for stale entries in general.
fn ensure_version(root: &Path) -> Result<(), Error> {
    let marker = root.join(VERSION_FILE);
    let current = fs::read_to_string(&marker)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());

    if current != Some(FORMAT_VERSION) {
        fs::write(&marker, FORMAT_VERSION.to_string()).map_err(|source| {
            Error::CacheDirUnavailable {
                path: marker,
                source,
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_fresh_version_marker() {
        let dir = tempfile::tempdir().unwrap();
        ensure_version(dir.path()).unwrap();
        let contents = fs::read_to_string(dir.path().join(VERSION_FILE)).unwrap();
        assert_eq!(contents, FORMAT_VERSION.to_string());
    }

    #[test]
    fn rewrites_a_stale_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(VERSION_FILE), "0").unwrap();
        ensure_version(dir.path()).unwrap();
        let contents = fs::read_to_string(dir.path().join(VERSION_FILE)).unwrap();
        assert_eq!(contents, FORMAT_VERSION.to_string());
    }
}
