// e2e/seek_api.rs — library-level end-to-end tests.
//
// Archives are built in-process with the bzip2 encoder.  A multi-block
// archive is assembled from independently compressed streams laid back to
// back: that is the one real-compressor layout in which every block magic
// is byte-aligned, which is what the scanner relies on.  Single-stream
// single-block archives cover the collapsed-window probe path.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::TempDir;

use bzseek::{ByteRange, DateSeeker, BLOCK_MAGIC, HEADER_LEN};

// ── Fixture helpers ───────────────────────────────────────────────────────────

/// One complete bzip2 stream for `data` (level 1: 100 KiB blocks).
fn compress_stream(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// All 24 hourly lines of one January 2020 day.
fn day_lines(day: u32) -> String {
    (0..24)
        .map(|hour| format!("2020-01-{day:02} {hour:02}:00:00 event {}\n", day * 100 + hour))
        .collect()
}

/// An archive assembled from per-chunk streams, with its layout facts.
struct Fixture {
    bytes: Vec<u8>,
    /// Block-magic offset of each chunk, in file order.
    magics: Vec<u64>,
    /// The full decompressed text.
    text: String,
}

impl Fixture {
    fn build(chunks: &[String]) -> Fixture {
        let mut bytes = Vec::new();
        let mut magics = Vec::new();
        let mut text = String::new();
        for chunk in chunks {
            magics.push(bytes.len() as u64 + HEADER_LEN);
            bytes.extend_from_slice(&compress_stream(chunk.as_bytes()));
            text.push_str(chunk);
        }
        Fixture { bytes, magics, text }
    }

    /// January 2020, four days per block, eight blocks.
    fn month() -> Fixture {
        let chunks: Vec<String> = (0u32..8)
            .map(|i| {
                let first = 1 + i * 4;
                let last = (first + 3).min(31);
                (first..=last).map(day_lines).collect()
            })
            .collect();
        Fixture::build(&chunks)
    }

    fn write_to(&self, dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, &self.bytes).unwrap();
        path
    }

    /// Every line of the archive carrying `date`, in file order.
    fn lines_with(&self, date: &str) -> String {
        self.text
            .lines()
            .filter(|line| line.contains(date))
            .map(|line| format!("{line}\n"))
            .collect()
    }

    /// Checks that a returned range starts and ends on block boundaries:
    /// block-magic offsets, or the file length for the final block.
    fn assert_block_aligned(&self, range: ByteRange) {
        assert!(
            self.magics.contains(&range.start),
            "range start {:#x} is not a block-magic offset",
            range.start
        );
        assert!(
            self.magics.contains(&range.end) || range.end == self.bytes.len() as u64,
            "range end {:#x} is neither a block-magic offset nor the file length",
            range.end
        );
        assert!(HEADER_LEN <= range.start && range.start < range.end);
        assert_eq!(&self.bytes[range.start as usize..range.start as usize + 6], &BLOCK_MAGIC);
    }
}

fn output(seeker: &mut DateSeeker, date: &str, start: u64) -> String {
    let mut sink = Vec::new();
    seeker.output_date(date, start, None, &mut sink).unwrap();
    String::from_utf8(sink).unwrap()
}

// ── Multi-block binary search ─────────────────────────────────────────────────

#[test]
fn seek_finds_the_block_covering_a_mid_month_date() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-15", None).unwrap().expect("date is present");

    fixture.assert_block_aligned(range);
    // Day 15 lives in the third chunk (days 13..=16).
    assert_eq!(range.start, fixture.magics[3]);
    assert_eq!(range.end, fixture.magics[4]);
}

#[test]
fn seek_misses_dates_outside_the_archive() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    // Earlier than the first timestamp, later than the last one.
    assert_eq!(seeker.seek("2019-12-31", None).unwrap(), None);
    assert_eq!(seeker.seek("2020-02-01", None).unwrap(), None);
}

#[test]
fn seek_reaches_the_first_block() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-02", None).unwrap().expect("date is present");
    fixture.assert_block_aligned(range);
    assert_eq!(range.start, fixture.magics[0]);
}

#[test]
fn seek_reaches_the_final_block_whose_end_is_the_file_length() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-30", None).unwrap().expect("date is present");
    fixture.assert_block_aligned(range);
    // Days 29..=31 live in the last chunk; its range reaches EOF and the
    // decoder trims the trailing checksum.
    assert_eq!(range.start, *fixture.magics.last().unwrap());
    assert_eq!(range.end, fixture.bytes.len() as u64);

    let printed = output(&mut seeker, "2020-01-30", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-30"));
}

#[test]
fn seek_is_idempotent_across_calls_and_printing() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let first = seeker.seek("2020-01-15", None).unwrap();
    let again = seeker.seek("2020-01-15", None).unwrap();
    assert_eq!(first, again);

    // Interleaving a print must not disturb later seeks.
    let range = first.unwrap();
    let _ = output(&mut seeker, "2020-01-15", range.start);
    assert_eq!(seeker.seek("2020-01-15", None).unwrap(), first);
    assert_eq!(seeker.seek("2020-01-07", None).unwrap().map(|r| r.start), Some(fixture.magics[1]));
}

// ── Line printing ─────────────────────────────────────────────────────────────

#[test]
fn printer_emits_exactly_the_matching_lines_in_order() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let path = fixture.write_to(&dir, "month.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-15", None).unwrap().expect("date is present");

    let printed = output(&mut seeker, "2020-01-15", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-15"));
    assert_eq!(printed.lines().count(), 24);
}

#[test]
fn printer_joins_a_line_straddling_a_block_boundary() {
    let dir = TempDir::new().unwrap();

    // Split the text mid-line inside the run of day-15 lines: the first
    // chunk ends with a dangling fragment, the second begins with its rest.
    let text: String = (14..=16).map(day_lines).collect();
    let cut_line = "2020-01-15 11:00:00";
    let cut = text.find(cut_line).unwrap() + cut_line.len() + 4;
    let chunks = vec![text[..cut].to_owned(), text[cut..].to_owned()];
    let fixture = Fixture::build(&chunks);
    let path = fixture.write_to(&dir, "straddle.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-15", None).unwrap().expect("date is present");
    assert_eq!(range.start, fixture.magics[0]);

    // The split line must come out whole, exactly once, in file order.
    let printed = output(&mut seeker, "2020-01-15", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-15"));
}

#[test]
fn printer_follows_the_date_across_whole_blocks() {
    let dir = TempDir::new().unwrap();

    // Day 15 spans a block boundary mid-line, so printing must walk from
    // the seeked block into the next one.
    let first_half: String = day_lines(14)
        + &day_lines(15).lines().take(12).map(|l| format!("{l}\n")).collect::<String>()
        + "2020-01-15 12:00:00 ev";
    let second_half: String = String::from("ent 1512\n")
        + &day_lines(15).lines().skip(13).map(|l| format!("{l}\n")).collect::<String>()
        + &day_lines(16);
    let fixture = Fixture::build(&[first_half, second_half]);
    let path = fixture.write_to(&dir, "split.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-15", None).unwrap().expect("date is present");
    assert_eq!(range.start, fixture.magics[0]);

    let printed = output(&mut seeker, "2020-01-15", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-15"));
    assert_eq!(printed.lines().count(), 24);
}

// ── Single-block archives ─────────────────────────────────────────────────────

#[test]
fn single_block_archive_resolves_through_the_final_probe() {
    let dir = TempDir::new().unwrap();
    let text: String = (1..=3).map(day_lines).collect();
    let fixture = Fixture::build(&[text]);
    let path = fixture.write_to(&dir, "single.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    assert_eq!(seeker.limits(), ByteRange { start: HEADER_LEN, end: HEADER_LEN });

    let range = seeker.seek("2020-01-02", None).unwrap().expect("date is present");
    assert_eq!(range, ByteRange { start: HEADER_LEN, end: fixture.bytes.len() as u64 });

    let printed = output(&mut seeker, "2020-01-02", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-02"));

    assert_eq!(seeker.seek("2020-01-05", None).unwrap(), None);
}

// ── Damage tolerance ──────────────────────────────────────────────────────────

#[test]
fn truncated_final_block_still_serves_earlier_dates() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::month();
    let cut = fixture.bytes.len() - 30;
    assert!(cut as u64 > *fixture.magics.last().unwrap() + 10);
    let path = dir.path().join("truncated.bz2");
    fs::write(&path, &fixture.bytes[..cut]).unwrap();

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker.seek("2020-01-15", None).unwrap().expect("date is present");
    assert_eq!(range.start, fixture.magics[3]);

    let printed = output(&mut seeker, "2020-01-15", range.start);
    assert_eq!(printed, fixture.lines_with("2020-01-15"));
}

// ── Format overrides ──────────────────────────────────────────────────────────

#[test]
fn per_call_format_override_takes_effect() {
    let dir = TempDir::new().unwrap();
    let text: String = (10..=12)
        .flat_map(|day| {
            (0..24).map(move |hour| format!("{day:02}/01/2020 {hour:02}:15:00 entry\n"))
        })
        .collect();
    let fixture = Fixture::build(&[text]);
    let path = fixture.write_to(&dir, "dmy.bz2");

    // Opened with the default pattern, overridden per call.
    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let range = seeker
        .seek("11/01/2020", Some("%d/%m/%Y"))
        .unwrap()
        .expect("date is present");

    let mut sink = Vec::new();
    seeker.output_date("11/01/2020", range.start, None, &mut sink).unwrap();
    let printed = String::from_utf8(sink).unwrap();
    assert_eq!(printed, fixture.lines_with("11/01/2020"));
    assert_eq!(printed.lines().count(), 24);
}

#[test]
fn unparseable_date_is_reported_as_a_date_error() {
    let dir = TempDir::new().unwrap();
    let fixture = Fixture::build(&[day_lines(1)]);
    let path = fixture.write_to(&dir, "one.bz2");

    let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
    let result = seeker.seek("January 1st", None);
    assert!(matches!(result, Err(bzseek::SeekError::Date(_))));
}
