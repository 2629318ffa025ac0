//! Binary-search seeker for dates in bzip2-compressed log files.
//!
//! bzip2 archives are a sequence of independently coded compressed blocks,
//! each introduced by a recognizable 48-bit magic sequence.  For a log file
//! whose lines carry timestamps in increasing order, that structure allows a
//! date lookup to binary-search over *compressed block boundaries*: only the
//! handful of blocks a probe lands on are ever decompressed.
//!
//! [`DateSeeker`] is the entry point: open an archive with a strftime-style
//! date pattern, `seek` a date to get the enclosing compressed block's byte
//! range, and `output_date` to stream the matching lines.
//!
//! ```no_run
//! use bzseek::DateSeeker;
//!
//! let mut seeker = DateSeeker::open("app.log.bz2", "%Y-%m-%d")?;
//! if let Some(block) = seeker.seek("2020-01-15", None)? {
//!     let mut stdout = std::io::stdout();
//!     seeker.output_date("2020-01-15", block.start, None, &mut stdout)?;
//! }
//! # Ok::<(), bzseek::SeekError>(())
//! ```

pub mod archive;
pub mod decoder;
pub mod error;
pub mod pattern;
pub mod seeker;
pub mod stamp;
mod util;

/// Archive descriptor and container walker.
pub use archive::{Archive, ByteRange, BLOCK_MAGIC, HEADER_LEN, STREAM_END_MAGIC};
/// Replaceable streaming-decompression state for single blocks.
pub use decoder::BlockDecoder;
pub use error::{ArchiveError, DateError, SeekError};
/// Date-format pattern translation and parsing.
pub use pattern::{format_to_regex, DateFormat, Locale};
/// The seek session type.
pub use seeker::DateSeeker;
