//! Error types for archive traversal and date handling.
//!
//! Two failure domains exist: the archive itself is structurally unusable
//! ([`ArchiveError`]), or the caller-supplied date / format pattern cannot be
//! worked with ([`DateError`]).  A date that simply does not occur in the
//! archive is *not* an error; `seek` reports it as `Ok(None)`.

use std::io;

use thiserror::Error;

/// Structural archive failure.  The archive does not have the layout the
/// seeker relies on, or the decoder rejected its bytes.  Callers are
/// expected to abort the operation; no retry will change the outcome.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The file does not start with `BZh` plus a block-size digit.
    #[error("not a bz2 file")]
    BadSignature,

    /// The first block magic does not immediately follow the stream header.
    #[error("the start bytes of the first block are incorrect")]
    MissingFirstBlock,

    /// No block magic could be located near the end of the file.
    #[error("the block structure of this file looks corrupted")]
    CorruptBlockStructure,

    /// A backward scan for a block magic exhausted its window without
    /// reaching the start of the file.
    #[error("scan limit reached while seeking the start of the block at byte {position}")]
    MagicNotFound {
        /// File offset the scan started from.
        position: u64,
    },

    /// The bzip2 decompressor rejected the block bytes.
    #[error("bzip2 decoder failure: {0}")]
    Decoder(#[from] bzip2::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The supplied date or format pattern is unusable.
#[derive(Debug, Error)]
pub enum DateError {
    /// The date string does not parse under the active format pattern.
    #[error("cannot read entered date {date:?} with the {format:?} format")]
    Unparseable {
        /// The rejected date string.
        date: String,
        /// The format pattern it was parsed under.
        format: String,
    },

    /// The format pattern does not translate into a compilable line regex
    /// (for example, it contains unbalanced regex metacharacters).
    #[error("date format {format:?} does not produce a usable line pattern")]
    BadFormat {
        /// The rejected format pattern.
        format: String,
        #[source]
        source: regex::Error,
    },

    /// A timestamp fell outside the representable date range.
    #[error("timestamp {0} is not representable as a date")]
    BadStamp(i64),
}

/// Any failure surfaced by the public seeker API.
#[derive(Debug, Error)]
pub enum SeekError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Date(#[from] DateError),

    /// Writing matched lines to the caller-supplied output failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
