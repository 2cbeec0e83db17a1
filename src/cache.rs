//! A content-addressed, TTL-gated store over a directory of files:
//! `spec.md §4.4`.

use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Length of the header that precedes a cache entry's TOML metadata:
/// a fixed-width little-endian byte count of the metadata block.
const HEADER_LEN: usize = 8;

/// One captured chunk of output, tagged with which stream it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A stored recording: metadata plus the concatenated raw bytes of every
/// chunk, in emission order. `chunk_lengths` lets a reader split the
/// concatenated blob back into its original `(stream, bytes)` sequence
/// without needing per-chunk timestamps (Open Question 5 in `DESIGN.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub started_at: u64,
    pub return_code: i32,
    pub chunks: Vec<(Stream, u64)>,
}

/// `RunResult` plus the raw bytes backing its chunks, as returned by a
/// cache read.
pub struct Recording {
    pub result: RunResult,
    pub data: Vec<u8>,
}
impl Recording {
    /// Split `data` back into the original ordered chunk sequence.
    pub fn chunks(&self) -> impl Iterator<Item = (Stream, &[u8])> {
        let mut offset = 0usize;
        self.result.chunks.iter().map(move |(stream, len)| {
            let len = *len as usize;
            let slice = &self.data[offset..offset + len];
            offset += len;
            (*stream, slice)
        })
    }
}

/// A content-addressed directory of cache entries.
///
/// Each fingerprint `fp` maps to a single file, `<fp>.entry`: an 8-byte
/// little-endian length header, the `RunResult` metadata encoded as TOML
/// text of that length, then the concatenated chunk bytes. Folding
/// metadata and data into one file means a single `Temp::persist` rename
/// publishes both together — a reader can never observe new chunk bytes
/// paired with a stale (or vice versa) metadata record, which two
/// independently-renamed sibling files could not guarantee (`spec.md
/// §4.4`'s "atomic rename or equivalent" names the whole entry, not its
/// parts).
pub struct CacheStore {
    root: PathBuf,
}
impl CacheStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The store's on-disk root, for `--print-cache-path`.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, fp: Fingerprint) -> PathBuf {
        self.root.join(format!("{}.entry", fp.to_hex()))
    }

    /// Look up `fp`. A corrupt or unreadable entry is treated as a miss
    /// (`CachePartial`, `spec.md §7`: "treat as miss; never propagate"),
    /// not an error.
    pub fn get(&self, fp: Fingerprint) -> Option<Recording> {
        let bytes = std::fs::read(self.entry_path(fp)).ok()?;
        if bytes.len() < HEADER_LEN {
            log::debug!("cache entry {fp} is shorter than its own header, treating as a miss");
            return None;
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        let meta_len = u64::from_le_bytes(header) as usize;

        let meta_end = HEADER_LEN.checked_add(meta_len)?;
        let meta_bytes = bytes.get(HEADER_LEN..meta_end)?;
        let meta_text = std::str::from_utf8(meta_bytes).ok()?;
        let result: RunResult = toml::from_str(meta_text).ok()?;
        let data = bytes[meta_end..].to_vec();

        let expected: u64 = result.chunks.iter().map(|(_, len)| len).sum();
        if expected != data.len() as u64 {
            log::debug!("cache entry {fp} has inconsistent chunk lengths, treating as a miss");
            return None;
        }

        Some(Recording { result, data })
    }

    /// Whether a fresh entry exists for `fp` (`spec.md §4.4` TTL policy:
    /// `now - started_at < ttl`).
    pub fn is_fresh(result: &RunResult, ttl: Duration, now: SystemTime) -> bool {
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now_secs.saturating_sub(result.started_at) < ttl.as_secs()
    }

    /// Atomically write `result`/`data` for `fp`, replacing any prior
    /// value. I/O failures here are `CacheWriteFailed` (`spec.md §7`):
    /// logged at `warn!`, the caller proceeds with the in-memory result
    /// it already has.
    pub fn put(&self, fp: Fingerprint, result: &RunResult, data: &[u8]) {
        if let Err(err) = self.try_put(fp, result, data) {
            log::warn!("failed to write cache entry {fp}: {err}");
        }
    }

    fn try_put(&self, fp: Fingerprint, result: &RunResult, data: &[u8]) -> std::io::Result<()> {
        let meta_text = toml::to_string(result)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let meta_bytes = meta_text.as_bytes();

        let mut buf = Vec::with_capacity(HEADER_LEN + meta_bytes.len() + data.len());
        buf.extend_from_slice(&(meta_bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(meta_bytes);
        buf.extend_from_slice(data);

        let temp = temp::Builder::new()
            .within(self.root.clone())
            .make(false)
            .create::<temp::File>()?;
        {
            let mut f = std::fs::File::create(temp.full())?;
            f.write_all(&buf)?;
        }
        temp.persist(self.entry_path(fp))?;

        Ok(())
    }
}
