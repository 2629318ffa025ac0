//! bzip2 container walking.
//!
//! A bzip2 stream is a 4-byte header (`BZh` plus a block-size digit)
//! followed by compressed blocks, each introduced by a 48-bit magic
//! sequence, and a 48-bit end-of-stream marker plus a 32-bit checksum.
//! [`Archive`] owns the open file and answers the two questions the
//! binary search needs: where does the block covering a byte offset start,
//! and where does the next block begin.
//!
//! The format permits blocks to start at any bit offset; this walker scans
//! for byte-aligned magic sequences only, which is how the targeted
//! archives are laid out in practice.  Scan windows are sized at two
//! advertised block sizes, which comfortably exceeds the largest possible
//! compressed block and bounds the I/O cost of a probe.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::info;

use crate::error::ArchiveError;
use crate::util::{find_bytes, rfind_bytes};

/// The 48-bit compressed-block magic (the binary-coded-decimal digits of pi).
pub const BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];

/// The 48-bit end-of-stream magic (sqrt of pi).  Everything after it is the
/// combined CRC, which must never reach the decoder.
pub const STREAM_END_MAGIC: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];

/// Length of the stream header: `BZh` plus one ASCII digit.
pub const HEADER_LEN: u64 = 4;

/// A pair of absolute file offsets with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
}

/// An opened bzip2 archive with its structural facts.
#[derive(Debug)]
pub struct Archive {
    file: File,
    file_size: u64,
    header: [u8; 4],
    block_size: u64,
    limits: ByteRange,
}

impl Archive {
    /// Opens `path` and probes the archive limits.
    ///
    /// Validates the stream header, requires the first block magic to sit
    /// immediately after it, and scans backward from the end of the file for
    /// the final block magic.  The resulting window
    /// `(header length, last block start)` is the legal seek range.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;

        let mut header = [0u8; 4];
        file.read_exact(&mut header)
            .map_err(|_| ArchiveError::BadSignature)?;
        if &header[..3] != b"BZh" || !(b'1'..=b'9').contains(&header[3]) {
            return Err(ArchiveError::BadSignature);
        }
        let block_size = u64::from(header[3] - b'0') * 100 * 1024;

        let mut first_magic = [0u8; 6];
        file.read_exact(&mut first_magic)
            .map_err(|_| ArchiveError::MissingFirstBlock)?;
        if first_magic != BLOCK_MAGIC {
            return Err(ArchiveError::MissingFirstBlock);
        }

        let file_size = file.metadata()?.len();

        let mut archive = Archive {
            file,
            file_size,
            header,
            block_size,
            limits: ByteRange {
                start: HEADER_LEN,
                end: HEADER_LEN,
            },
        };

        let last_block = archive
            .scan_backward(file_size)?
            .ok_or(ArchiveError::CorruptBlockStructure)?;
        archive.limits.end = last_block;

        info!(
            "opened archive: {} bytes, advertised block size {} KiB, seek window [{:#x}, {:#x}]",
            file_size,
            block_size / 1024,
            archive.limits.start,
            archive.limits.end
        );
        Ok(archive)
    }

    /// Total length of the archive file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The 4-byte stream header, prepended when priming a fresh decoder.
    pub fn header(&self) -> [u8; 4] {
        self.header
    }

    /// Advertised uncompressed block size (header digit × 100 KiB).
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// The legal seek window: first block start to last block start.
    pub fn limits(&self) -> ByteRange {
        self.limits
    }

    /// Offset of the nearest block magic starting at or before `pos`.
    ///
    /// The scan window is extended past `pos` by the magic length so a
    /// magic *starting* at `pos` still counts.  When the window reaches the
    /// start of the file without a match, the first block (right after the
    /// header) is the answer.  A missed window anywhere else means the
    /// block structure does not hold.
    pub fn magic_before(&mut self, pos: u64) -> Result<u64, ArchiveError> {
        let magic_len = BLOCK_MAGIC.len() as u64;
        let window_start = pos.saturating_sub(2 * self.block_size);
        let window = self.read_span(window_start, pos + magic_len)?;
        match rfind_bytes(&window, &BLOCK_MAGIC) {
            Some(i) => Ok(window_start + i as u64),
            None if window_start == 0 => Ok(HEADER_LEN),
            None => Err(ArchiveError::MagicNotFound { position: pos }),
        }
    }

    /// Offset of the next block magic starting strictly after `pos`, or
    /// the file length when no further magic exists.  The decoder trims
    /// the trailing checksum from any range that reaches the end of the
    /// file.
    pub fn magic_after(&mut self, pos: u64) -> Result<u64, ArchiveError> {
        let from = pos + 1;
        let window = self.read_span(from, from + 2 * self.block_size)?;
        Ok(match find_bytes(&window, &BLOCK_MAGIC) {
            Some(i) => from + i as u64,
            None => self.file_size,
        })
    }

    /// End offset of the block starting at `block_start`: the next magic
    /// after the block's own, or the file length for the final block.
    pub fn end_of_block(&mut self, block_start: u64) -> Result<u64, ArchiveError> {
        self.magic_after(block_start + BLOCK_MAGIC.len() as u64 - 1)
    }

    /// Reads the byte span `[start, end)`, clamped to the file length.
    pub(crate) fn read_span(&mut self, start: u64, end: u64) -> Result<Vec<u8>, ArchiveError> {
        let end = end.min(self.file_size);
        let len = end.saturating_sub(start) as usize;
        let mut buf = vec![0u8; len];
        if len > 0 {
            self.file.seek(SeekFrom::Start(start))?;
            self.file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    /// Backward scan for the last block magic in a window ending at `pos`.
    fn scan_backward(&mut self, pos: u64) -> Result<Option<u64>, ArchiveError> {
        let window_start = pos.saturating_sub(2 * self.block_size);
        let window = self.read_span(window_start, pos)?;
        Ok(rfind_bytes(&window, &BLOCK_MAGIC).map(|i| window_start + i as u64))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use tempfile::TempDir;

    fn write_archive(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn rejects_non_bzip2_file() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, "plain.txt", b"definitely not an archive");
        assert!(matches!(
            Archive::open(&path),
            Err(ArchiveError::BadSignature)
        ));
    }

    #[test]
    fn rejects_header_without_block_magic() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"BZh9".to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        let path = write_archive(&dir, "nomagic.bz2", &bytes);
        assert!(matches!(
            Archive::open(&path),
            Err(ArchiveError::MissingFirstBlock)
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, "tiny.bz2", b"BZ");
        assert!(matches!(
            Archive::open(&path),
            Err(ArchiveError::BadSignature)
        ));
    }

    #[test]
    fn opens_single_block_archive() {
        let dir = TempDir::new().unwrap();
        let bytes = compress(b"hello bzip2 world\n");
        let path = write_archive(&dir, "single.bz2", &bytes);

        let archive = Archive::open(&path).unwrap();
        assert_eq!(archive.block_size(), 100 * 1024);
        assert_eq!(archive.file_size(), bytes.len() as u64);
        // One block: the seek window collapses onto the first block start.
        assert_eq!(
            archive.limits(),
            ByteRange {
                start: HEADER_LEN,
                end: HEADER_LEN
            }
        );
    }

    #[test]
    fn walker_answers_for_single_block() {
        let dir = TempDir::new().unwrap();
        let bytes = compress(b"hello bzip2 world\n");
        let path = write_archive(&dir, "single.bz2", &bytes);
        let mut archive = Archive::open(&path).unwrap();

        // Before any interior offset the only magic is the first one.
        assert_eq!(archive.magic_before(3).unwrap(), HEADER_LEN);
        assert_eq!(archive.magic_before(HEADER_LEN).unwrap(), HEADER_LEN);
        assert_eq!(archive.magic_before(archive.file_size()).unwrap(), HEADER_LEN);
        // No further magic: the block runs to the end of the file.
        let end = archive.end_of_block(HEADER_LEN).unwrap();
        assert_eq!(end, archive.file_size());
    }

    #[test]
    fn walker_locates_interior_magic() {
        // Two independently compressed streams back to back give a second
        // byte-aligned block magic at the second stream's offset 4.
        let dir = TempDir::new().unwrap();
        let first = compress(b"stream one\n");
        let second = compress(b"stream two\n");
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second);
        let path = write_archive(&dir, "double.bz2", &bytes);

        let mut archive = Archive::open(&path).unwrap();
        let second_magic = first.len() as u64 + HEADER_LEN;
        assert_eq!(archive.limits().end, second_magic);
        assert_eq!(archive.end_of_block(HEADER_LEN).unwrap(), second_magic);
        // A magic starting exactly at the probe position counts.
        assert_eq!(archive.magic_before(second_magic).unwrap(), second_magic);
        assert_eq!(archive.magic_before(second_magic + 1).unwrap(), second_magic);
        // ...but never as its own successor.
        assert_eq!(archive.magic_after(second_magic).unwrap(), archive.file_size());
        assert_eq!(
            archive.end_of_block(second_magic).unwrap(),
            archive.file_size()
        );
    }

    #[test]
    fn read_span_clamps_to_file_length() {
        let dir = TempDir::new().unwrap();
        let bytes = compress(b"clamp me\n");
        let path = write_archive(&dir, "clamp.bz2", &bytes);
        let mut archive = Archive::open(&path).unwrap();

        let span = archive.read_span(0, archive.file_size() + 64).unwrap();
        assert_eq!(span.len(), bytes.len());
        let empty = archive
            .read_span(archive.file_size() + 8, archive.file_size() + 16)
            .unwrap();
        assert!(empty.is_empty());
    }
}
