//! The date seeker: block-level binary search and line streaming.
//!
//! [`DateSeeker`] couples the container walker, the block decoder and the
//! active date format into one session over an archive.  `seek` locates the
//! compressed block whose timestamp span covers a target date without
//! decompressing anything else; `output_date` streams every matching line
//! from a starting block onward.
//!
//! The search has structural rather than arithmetic midpoints: a byte
//! midpoint is widened to the enclosing block's boundaries before probing,
//! so successive probes can land on the same block.  A probe landing on the
//! same block twice makes no progress and ends the search empty-handed.

use std::io::Write;
use std::path::Path;

use log::debug;

use crate::archive::{Archive, ByteRange};
use crate::decoder::BlockDecoder;
use crate::error::SeekError;
use crate::pattern::{DateFormat, Locale};
use crate::stamp::block_stamps;
use crate::util::{find_byte, find_bytes, rfind_byte};

/// A seek session over one bzip2-compressed log archive.
///
/// The file handle, the decompression state and the active format are
/// mutable session state; operations take `&mut self` and must not be
/// interleaved from multiple threads.  Callers wanting parallelism open
/// independent seekers.  The handle closes when the seeker drops, on every
/// exit path.
pub struct DateSeeker {
    archive: Archive,
    decoder: BlockDecoder,
    format: DateFormat,
    locale: Locale,
}

impl DateSeeker {
    /// Opens the archive at `path` with the given date-format pattern and
    /// the C-locale translation tables.
    pub fn open<P: AsRef<Path>>(path: P, pattern: &str) -> Result<Self, SeekError> {
        Self::open_with_locale(path, pattern, Locale::default())
    }

    /// Opens the archive with caller-supplied locale tables.
    pub fn open_with_locale<P: AsRef<Path>>(
        path: P,
        pattern: &str,
        locale: Locale,
    ) -> Result<Self, SeekError> {
        let archive = Archive::open(path.as_ref())?;
        let format = DateFormat::new(pattern, &locale)?;
        Ok(DateSeeker {
            archive,
            decoder: BlockDecoder::new(),
            format,
            locale,
        })
    }

    /// Replaces the active date format; takes effect before any byte-level
    /// work of the next operation.
    pub fn set_format(&mut self, pattern: &str) -> Result<(), SeekError> {
        self.format = DateFormat::new(pattern, &self.locale)?;
        Ok(())
    }

    /// The active date-format pattern.
    pub fn format_pattern(&self) -> &str {
        self.format.pattern()
    }

    /// The legal seek window reported by the container walker.
    pub fn limits(&self) -> ByteRange {
        self.archive.limits()
    }

    /// Total archive length in bytes.
    pub fn file_size(&self) -> u64 {
        self.archive.file_size()
    }

    /// Advertised uncompressed block size.
    pub fn block_size(&self) -> u64 {
        self.archive.block_size()
    }

    /// Searches for the compressed block containing the first occurrence of
    /// `date`.
    ///
    /// Returns the block's byte range, or `None` when the date is not in
    /// the archive.  A `pattern` argument overrides the active format for
    /// this and subsequent calls.
    pub fn seek(
        &mut self,
        date: &str,
        pattern: Option<&str>,
    ) -> Result<Option<ByteRange>, SeekError> {
        if let Some(pattern) = pattern {
            self.set_format(pattern)?;
        }
        let stamp = self.format.to_timestamp(date)?;
        self.find_block(stamp)
    }

    /// Streams every line carrying `date` to `out`, starting from the block
    /// at `start` and following blocks as long as the date keeps appearing.
    ///
    /// The scanned substring is the canonical rendering of the parsed date
    /// under the active pattern, so equivalent spellings of the same date
    /// select the same lines.
    pub fn output_date<W: Write>(
        &mut self,
        date: &str,
        start: u64,
        pattern: Option<&str>,
        out: &mut W,
    ) -> Result<(), SeekError> {
        if let Some(pattern) = pattern {
            self.set_format(pattern)?;
        }
        let stamp = self.format.to_timestamp(date)?;
        let needle = self.format.render(stamp)?;

        let mut range = ByteRange {
            start,
            end: self.archive.end_of_block(start)?,
        };
        let mut carry = self.print_block(range, needle.as_bytes(), None, out)?;
        while let Some(rest) = carry {
            let next = ByteRange {
                start: range.end,
                end: self.archive.end_of_block(range.end)?,
            };
            range = next;
            carry = self.print_block(range, needle.as_bytes(), Some(rest), out)?;
        }
        Ok(())
    }

    // ── Binary search ─────────────────────────────────────────────────────

    /// Narrows the seek window block by block until a block's timestamp
    /// span covers `stamp`.
    fn find_block(&mut self, stamp: i64) -> Result<Option<ByteRange>, SeekError> {
        let ByteRange {
            start: mut rmin,
            end: mut rmax,
        } = self.archive.limits();
        let mut last_probe: Option<u64> = None;

        while rmin < rmax {
            let middle = rmin + (rmax - rmin) / 2;
            let block_start = self.archive.magic_before(middle)?;
            let block_end = self.archive.magic_after(middle)?;
            if block_start >= rmax {
                break;
            }
            // A block that yields no usable stamps narrows the window
            // without moving it past the block; probing it again would loop
            // forever.
            if last_probe == Some(block_start) {
                debug!("probe repeated at {block_start:#x}; date not found");
                return Ok(None);
            }
            last_probe = Some(block_start);

            let block = self.read_block(ByteRange {
                start: block_start,
                end: block_end,
            })?;
            let (start_stamp, end_stamp) = block_stamps(&block, &self.format);
            debug!(
                "window [{rmin:#x}, {rmax:#x}) midpoint {middle:#x}: \
                 block [{block_start:#x}, {block_end:#x}) spans ({start_stamp}, {end_stamp})"
            );

            if start_stamp != end_stamp && start_stamp <= stamp && stamp <= end_stamp {
                return Ok(Some(ByteRange {
                    start: block_start,
                    end: block_end,
                }));
            }
            if start_stamp < stamp {
                rmin = block_end;
            } else {
                rmax = block_start;
            }
        }

        // The window collapsed onto a single block start; one direct probe
        // decides.  This is also the whole search for a one-block archive.
        if rmin == rmax {
            let block_start = rmin;
            let block_end = self.archive.end_of_block(block_start)?;
            let block = self.read_block(ByteRange {
                start: block_start,
                end: block_end,
            })?;
            let (start_stamp, end_stamp) = block_stamps(&block, &self.format);
            debug!(
                "final probe: block [{block_start:#x}, {block_end:#x}) \
                 spans ({start_stamp}, {end_stamp})"
            );
            if start_stamp <= stamp && stamp <= end_stamp {
                return Ok(Some(ByteRange {
                    start: block_start,
                    end: block_end,
                }));
            }
        }
        Ok(None)
    }

    /// Reads and decompresses the block at `range`, trimming the trailing
    /// checksum when the range reaches the end of the file.
    fn read_block(&mut self, range: ByteRange) -> Result<Vec<u8>, SeekError> {
        let file_size = self.archive.file_size();
        let mut end = range.end;
        let mut terminal = false;
        if end >= file_size {
            end = file_size.saturating_sub(4);
            terminal = true;
        }
        let raw = self.archive.read_span(range.start, end)?;
        let header = self.archive.header();
        Ok(self.decoder.decode(header, &raw, terminal)?)
    }

    // ── Line streaming ────────────────────────────────────────────────────

    /// Emits the matching lines of one block.
    ///
    /// `carry` is a line fragment left over from the previous block; it is
    /// joined with this block's leading fragment and emitted once when the
    /// joined line matches.  Returns this block's own trailing fragment
    /// when the block ends mid-line and every complete line matched so far,
    /// or `None` when streaming should stop.
    fn print_block<W: Write>(
        &mut self,
        range: ByteRange,
        needle: &[u8],
        carry: Option<Vec<u8>>,
        out: &mut W,
    ) -> Result<Option<Vec<u8>>, SeekError> {
        let block = self.read_block(range)?;

        let mut search_from = 0usize;
        if let Some(mut joined) = carry {
            let first_newline = find_byte(&block, b'\n').unwrap_or(block.len());
            joined.extend_from_slice(&block[..first_newline]);
            if find_bytes(&joined, needle).is_some() {
                out.write_all(&joined)?;
                out.write_all(b"\n")?;
            }
            // The fragment is spoken for; never emit it a second time.
            search_from = (first_newline + 1).min(block.len());
        }

        let Some(relative) = find_bytes(&block[search_from..], needle) else {
            return Ok(None);
        };
        let needle_pos = search_from + relative;
        let line_start = match rfind_byte(&block[..needle_pos], b'\n') {
            Some(i) => i + 1,
            None => 0,
        };

        let mut cursor = line_start;
        while cursor < block.len() {
            match find_byte(&block[cursor..], b'\n') {
                Some(nl) => {
                    let line = &block[cursor..cursor + nl];
                    if find_bytes(line, needle).is_none() {
                        return Ok(None);
                    }
                    out.write_all(line)?;
                    out.write_all(b"\n")?;
                    cursor += nl + 1;
                }
                // The block ends mid-line; the fragment continues in the
                // next block.
                None => return Ok(Some(block[cursor..].to_vec())),
            }
        }
        Ok(None)
    }
}
