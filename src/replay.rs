//! Streams a stored recording back to the caller: `spec.md §4.5`.

use crate::cache::{Recording, Stream};
use std::io::{self, Write};

/// Replay `recording` to `out`/`err` in stored order, returning the
/// stored exit code. When `strip_colors` is set, ANSI/CSI escape
/// sequences are removed from each chunk before it is written.
///
/// Broken pipes on the caller's own stdout/stderr are swallowed
/// (`TerminalBrokenPipe`, `spec.md §7`): replay is best-effort I/O and a
/// closed terminal must not turn a cache hit into a reported failure.
pub fn replay(
    recording: &Recording,
    strip_colors: bool,
    mut out: impl Write,
    mut err: impl Write,
) -> i32 {
    for (stream, bytes) in recording.chunks() {
        let sink: &mut dyn Write = match stream {
            Stream::Stdout => &mut out,
            Stream::Stderr => &mut err,
        };
        let owned;
        let to_write = if strip_colors {
            owned = strip_ansi(bytes);
            owned.as_slice()
        } else {
            bytes
        };
        if let Err(e) = sink.write_all(to_write)
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            log::debug!("replay write failed: {e}");
        }
    }
    recording.result.return_code
}

/// Remove ANSI/CSI escape sequences (`ESC '[' ... final-byte`, where the
/// final byte is in `0x40..=0x7E`) and bare `ESC` bytes not followed by
/// `[` from `bytes`. Idempotent: the output contains no `0x1B` bytes, so
/// a second pass is a no-op (`spec.md §8`, ANSI strip idempotence).
pub fn strip_ansi(bytes: &[u8]) -> Vec<u8> {
    const ESC: u8 = 0x1b;
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESC {
            if bytes.get(i + 1) == Some(&b'[') {
                let mut j = i + 2;
                while j < bytes.len() && !(0x40..=0x7e).contains(&bytes[j]) {
                    j += 1;
                }
                // Consume the final byte too, if present.
                i = (j + 1).min(bytes.len()).max(i + 1);
            } else {
                i += 1;
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RunResult;

    #[test]
    fn strips_a_color_sequence() {
        let input = b"\x1b[31mred\x1b[0m plain";
        let stripped = strip_ansi(input);
        assert_eq!(stripped, b"red plain");
    }

    #[test]
    fn strip_is_idempotent() {
        let input = b"\x1b[1;32mgreen\x1b[0m";
        let once = strip_ansi(input);
        let twice = strip_ansi(&once);
        assert_eq!(once, twice);
        assert!(!once.contains(&0x1b));
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(strip_ansi(b"no escapes here"), b"no escapes here");
    }

    #[test]
    fn replay_reproduces_stored_bytes_per_stream() {
        let result = RunResult {
            started_at: 0,
            return_code: 0,
            chunks: vec![(Stream::Stdout, 4), (Stream::Stderr, 4), (Stream::Stdout, 4)],
        };
        let recording = Recording {
            result,
            data: b"foo\nbar\nbaz\n".to_vec(),
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = replay(&recording, false, &mut out, &mut err);
        assert_eq!(code, 0);
        assert_eq!(out, b"foo\nbaz\n");
        assert_eq!(err, b"bar\n");
    }
}
