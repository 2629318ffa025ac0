//! Streaming decompression of individual blocks.
//!
//! A bzip2 block cannot be decoded in isolation: the decompressor wants to
//! see a stream header first so it can size its tables.  [`BlockDecoder`]
//! therefore primes a fresh [`bzip2::Decompress`] state with the archive's
//! own 4-byte header on the first feed, then keeps the state alive across
//! subsequent feeds — the decompressor treats whatever block arrives next as
//! the continuation of the stream, which holds for any block order because
//! every block carries its own coding tables.
//!
//! The state must be discarded in two situations: after a terminal read
//! (one whose range reached the end of the file, so the trailing checksum
//! was truncated away and the stream can never be finished), and after the
//! decompressor reports end-of-stream with nothing left in the range.
//! Either way the next feed starts from a fresh, header-primed state.  An
//! end-of-stream with bytes still pending means a whole stream boundary sat
//! inside the range; the remainder carries its own header and is decoded
//! with a fresh state so the payload always covers the full byte range.

use bzip2::{Decompress, Status};

use crate::error::ArchiveError;

/// Output is drained in chunks of this size.
const DRAIN_CHUNK: usize = 64 * 1024;

/// A replaceable decompression state with its "first feed" flag.
pub struct BlockDecoder {
    state: Decompress,
    fresh: bool,
}

impl Default for BlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDecoder {
    /// Creates a decoder whose next feed primes a fresh state.
    pub fn new() -> Self {
        BlockDecoder {
            state: Decompress::new(false),
            fresh: true,
        }
    }

    /// Discards the decompression state; the next feed starts fresh.
    pub fn reset(&mut self) {
        self.state = Decompress::new(false);
        self.fresh = true;
    }

    /// Decompresses one block's raw bytes into its payload.
    ///
    /// `header` is the archive's stream header, prepended when the state is
    /// fresh.  `terminal` marks a read whose range reached the end of the
    /// file; the state is discarded afterwards.  Decoder errors are
    /// structural archive errors and any partial output is dropped.
    pub fn decode(
        &mut self,
        header: [u8; 4],
        raw: &[u8],
        terminal: bool,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut input = Vec::with_capacity(header.len() + raw.len());
        if self.fresh {
            input.extend_from_slice(&header);
            self.fresh = false;
        }
        input.extend_from_slice(raw);

        let result = self.drain(&input);
        if terminal || result.as_ref().map(|r| r.1).unwrap_or(true) {
            self.reset();
        }
        result.map(|r| r.0)
    }

    /// Feeds `input` to the state and collects every byte of output it will
    /// produce.  Returns the payload and whether the stream ended exactly at
    /// the end of the input.
    fn drain(&mut self, input: &[u8]) -> Result<(Vec<u8>, bool), ArchiveError> {
        let mut out: Vec<u8> = Vec::new();
        let mut consumed = 0usize;
        loop {
            if out.capacity() == out.len() {
                out.reserve(DRAIN_CHUNK);
            }
            let in_before = self.state.total_in();
            let out_before = self.state.total_out();
            let status = self.state.decompress_vec(&input[consumed..], &mut out)?;
            consumed += (self.state.total_in() - in_before) as usize;
            let produced = self.state.total_out() - out_before;

            if let Status::StreamEnd = status {
                if consumed >= input.len() {
                    return Ok((out, true));
                }
                // Bytes beyond an end-of-stream marker can only be another
                // stream carrying its own header; decode the rest of the
                // range with a fresh state.
                self.state = Decompress::new(false);
                continue;
            }
            // Out of input with nothing left buffered: the block is drained.
            if produced == 0 && self.state.total_in() == in_before {
                return Ok((out, false));
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn header_of(stream: &[u8]) -> [u8; 4] {
        [stream[0], stream[1], stream[2], stream[3]]
    }

    #[test]
    fn decodes_block_with_trimmed_checksum() {
        let payload = b"one\ntwo\nthree\n".repeat(64);
        let stream = compress(&payload);
        let header = header_of(&stream);

        // Everything after the header, minus the 4 trailing CRC bytes, is
        // what a terminal block read feeds the decoder.
        let raw = &stream[4..stream.len() - 4];
        let mut decoder = BlockDecoder::new();
        let out = decoder.decode(header, raw, true).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn terminal_read_resets_the_state() {
        let payload = b"alpha beta gamma\n".repeat(32);
        let stream = compress(&payload);
        let header = header_of(&stream);
        let raw = &stream[4..stream.len() - 4];

        let mut decoder = BlockDecoder::new();
        let first = decoder.decode(header, raw, true).unwrap();
        // A second read from the same offset must start fresh and succeed.
        let second = decoder.decode(header, raw, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stream_end_resets_the_state() {
        let payload = b"delta epsilon\n".repeat(32);
        let stream = compress(&payload);
        let header = header_of(&stream);

        // Feed a whole stream (checksum included): the decompressor reports
        // end-of-stream and the decoder must recover for the next feed.
        let mut decoder = BlockDecoder::new();
        let first = decoder.decode(header, &stream[4..], false).unwrap();
        assert_eq!(first, payload);
        let second = decoder.decode(header, &stream[4..], false).unwrap();
        assert_eq!(second, payload);
    }

    #[test]
    fn range_spanning_a_stream_boundary_decodes_completely() {
        let first = compress(b"first payload\n");
        let second = compress(b"second payload\n");
        let header = header_of(&first);

        // A range covering one stream's tail and the next stream whole:
        // everything after the first header, both checksums included.
        let mut raw = first[4..].to_vec();
        raw.extend_from_slice(&second);

        let mut decoder = BlockDecoder::new();
        let out = decoder.decode(header, &raw, false).unwrap();
        assert_eq!(out, b"first payload\nsecond payload\n");
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        let mut decoder = BlockDecoder::new();
        let out = decoder.decode(*b"BZh1", &[], false).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn garbage_input_is_a_decoder_error() {
        let mut decoder = BlockDecoder::new();
        let garbage = [0xCCu8; 64];
        assert!(matches!(
            decoder.decode(*b"BZh1", &garbage, false),
            Err(ArchiveError::Decoder(_))
        ));
    }
}
