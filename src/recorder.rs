//! Captures a running child's stdout/stderr concurrently, tees every byte
//! to the caller's own streams as it arrives, and assembles the ordered
//! chunk sequence the cache store and replayer both need: `spec.md §4.3`'s
//! capture contract, implemented with the thread-per-stream model spec.md
//! §5 names as equivalent to two cooperative reader tasks.

use crate::cache::Stream as ChunkStream;
use std::{
    io::{self, Read, Write},
    sync::mpsc,
    thread,
};

/// One chunk as it comes off a reader thread, before being folded into
/// the final `RunResult`.
struct RawChunk {
    stream: ChunkStream,
    bytes: Vec<u8>,
}

/// The assembled result of a capture: the concatenated bytes plus the
/// `(stream, length)` header sequence `cache::RunResult` stores.
pub struct Captured {
    pub data: Vec<u8>,
    pub chunk_lengths: Vec<(ChunkStream, u64)>,
}

const CHUNK_SIZE: usize = 8192;

/// Drain `stdout`/`stderr` concurrently, live-tee each chunk to `out`/`err`
/// as it arrives, and return the merged, ordered recording.
///
/// Each reader thread reads up to `CHUNK_SIZE` bytes at a time and sends
/// the chunk down a shared `mpsc::Sender` the moment it has it; because
/// `mpsc` is FIFO, the receiver observes chunks in the wall-clock order
/// they were sent, satisfying the `OC` property (cross-stream ordering
/// reflects delivery order to the parent, not the child's write order).
/// Within a single stream, sequential reads from one thread preserve
/// that stream's own byte order.
pub fn capture(
    mut stdout: impl Read + Send + 'static,
    mut stderr: impl Read + Send + 'static,
    mut out: impl Write,
    mut err: impl Write,
) -> Captured {
    let (tx, rx) = mpsc::channel::<RawChunk>();

    let stdout_tx = tx.clone();
    let stdout_thread = thread::spawn(move || {
        read_loop(&mut stdout, ChunkStream::Stdout, &stdout_tx);
    });

    let stderr_thread = thread::spawn(move || {
        read_loop(&mut stderr, ChunkStream::Stderr, &tx);
    });

    let mut data = Vec::new();
    let mut chunk_lengths = Vec::new();

    // `rx` yields `Err` once both senders (the clone held by the stdout
    // thread and the original held by the stderr thread) are dropped,
    // which happens when both reader threads have finished.
    while let Ok(chunk) = rx.recv() {
        let sink: &mut dyn Write = match chunk.stream {
            ChunkStream::Stdout => &mut out,
            ChunkStream::Stderr => &mut err,
        };
        if let Err(e) = sink.write_all(&chunk.bytes)
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            log::debug!("live-tee write failed: {e}");
        }
        chunk_lengths.push((chunk.stream, chunk.bytes.len() as u64));
        data.extend_from_slice(&chunk.bytes);
    }

    let _ = stdout_thread.join();
    let _ = stderr_thread.join();

    Captured {
        data,
        chunk_lengths,
    }
}

fn read_loop(reader: &mut impl Read, stream: ChunkStream, tx: &mpsc::Sender<RawChunk>) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx
                    .send(RawChunk {
                        stream,
                        bytes: buf[..n].to_vec(),
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}
