//! Timestamp extraction from the edges of a decoded block.
//!
//! A decoded block almost never starts or ends on a log-line boundary, so
//! the very first and very last newline-delimited pieces are usually
//! fragments.  The head slice therefore runs through the *second* newline
//! (the first complete line lives in it, and a leading fragment cannot hide
//! a line-initial date because its head is cut off), and the tail slice runs
//! from the newline preceding the last complete line to the buffer end.  The
//! first regex match wins at the head, the last match wins at the tail —
//! a trailing fragment keeps its line head intact, so a date found there is
//! the latest one visible in the block.

use crate::pattern::DateFormat;
use crate::util::{find_byte, rfind_byte};

/// Extracts `(start_stamp, end_stamp)` from a decoded block.
///
/// Either side is `0` when no timestamp can be recognized there.
pub fn block_stamps(block: &[u8], format: &DateFormat) -> (i64, i64) {
    let head_end = match find_byte(block, b'\n') {
        Some(first) => match find_byte(&block[first + 1..], b'\n') {
            Some(second) => first + 1 + second,
            None => block.len(),
        },
        None => block.len(),
    };

    let tail_start = match rfind_byte(block, b'\n') {
        Some(last) => rfind_byte(&block[..last.saturating_sub(1)], b'\n').unwrap_or(0),
        None => 0,
    };

    (
        stamp_from_line(&block[..head_end], format, false),
        stamp_from_line(&block[tail_start..], format, true),
    )
}

/// Recognizes a timestamp inside one line (or edge slice) of a block.
///
/// Scanning forward takes the first regex match, scanning in reverse takes
/// the last.  A missing match, a non-UTF-8 matched range, an unparseable
/// date and a non-positive stamp all collapse to the `0` sentinel.
pub fn stamp_from_line(line: &[u8], format: &DateFormat, reverse: bool) -> i64 {
    if line.is_empty() {
        return 0;
    }
    let found = if reverse {
        format.regex().find_iter(line).last()
    } else {
        format.regex().find(line)
    };
    let Some(found) = found else {
        return 0;
    };
    let Ok(text) = std::str::from_utf8(found.as_bytes()) else {
        return 0;
    };
    match format.to_timestamp(text) {
        Ok(stamp) if stamp > 0 => stamp,
        _ => 0,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
