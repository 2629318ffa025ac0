// e2e/cli_integration.rs — CLI integration tests.
//
// Drives the `bzseek` binary as a black box using std::process::Command.
// Covers line output, offset output (decimal and hex), exit codes for
// domain errors, and argument errors.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::TempDir;

/// Locate the `bzseek` binary produced by Cargo.
fn bzseek_bin() -> PathBuf {
    // CARGO_BIN_EXE_bzseek is set by Cargo when running integration tests.
    // Fall back to walking up from the test binary location.
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_bzseek") {
        return PathBuf::from(p);
    }
    let mut p = std::env::current_exe().unwrap();
    p.pop(); // remove test binary filename
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("bzseek");
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bzseek_bin())
        .args(args)
        .output()
        .expect("failed to run bzseek")
}

/// Three-day archive (two independently compressed blocks) plus the lines
/// expected for the middle day.
fn make_archive(dir: &TempDir) -> (PathBuf, String) {
    let day = |d: u32| -> String {
        (0..12)
            .map(|h| format!("2020-01-{d:02} {h:02}:30:00 worker heartbeat\n"))
            .collect()
    };
    let chunk_one = day(14) + &day(15);
    let chunk_two = day(16);

    let mut bytes = Vec::new();
    for chunk in [&chunk_one, &chunk_two] {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
        encoder.write_all(chunk.as_bytes()).unwrap();
        bytes.extend_from_slice(&encoder.finish().unwrap());
    }

    let path = dir.path().join("app.log.bz2");
    fs::write(&path, bytes).unwrap();
    (path, day(15))
}

// ── 1. Line output ────────────────────────────────────────────────────────────

#[test]
fn test_cli_prints_matching_lines() {
    let dir = TempDir::new().unwrap();
    let (archive, expected) = make_archive(&dir);

    let output = run(&[archive.to_str().unwrap(), "2020-01-15"]);
    assert!(output.status.success(), "status: {}", output.status);
    assert_eq!(String::from_utf8_lossy(&output.stdout), expected);
}

// ── 2. Offset output ──────────────────────────────────────────────────────────

#[test]
fn test_cli_offset_only() {
    let dir = TempDir::new().unwrap();
    let (archive, _) = make_archive(&dir);

    let output = run(&["-o", archive.to_str().unwrap(), "2020-01-15"]);
    assert!(output.status.success(), "status: {}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();

    let start_line = lines.next().expect("start offset line");
    let end_line = lines.next().expect("end offset line");
    assert!(start_line.starts_with("Start offset of the block in the archive: "));
    assert!(end_line.starts_with("End offset of the block in the archive: "));

    // The first block starts right after the 4-byte header.
    let start: u64 = start_line.rsplit(' ').next().unwrap().parse().unwrap();
    let end: u64 = end_line.rsplit(' ').next().unwrap().parse().unwrap();
    assert_eq!(start, 4);
    assert!(end > start);
}

#[test]
fn test_cli_offset_only_hex() {
    let dir = TempDir::new().unwrap();
    let (archive, _) = make_archive(&dir);

    let output = run(&["-o", "-x", archive.to_str().unwrap(), "2020-01-15"]);
    assert!(output.status.success(), "status: {}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Start offset of the block in the archive: 0x4"),
        "unexpected stdout: {stdout}"
    );
}

// ── 3. Domain errors exit 1 ───────────────────────────────────────────────────

#[test]
fn test_cli_date_not_found() {
    let dir = TempDir::new().unwrap();
    let (archive, _) = make_archive(&dir);

    let output = run(&[archive.to_str().unwrap(), "2020-03-01"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: "), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_rejects_non_bzip2_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.log");
    fs::write(&path, "2020-01-15 00:00:00 not compressed\n").unwrap();

    let output = run(&[path.to_str().unwrap(), "2020-01-15"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a bz2 file"), "stderr: {stderr}");
}

#[test]
fn test_cli_rejects_unparseable_date() {
    let dir = TempDir::new().unwrap();
    let (archive, _) = make_archive(&dir);

    let output = run(&[archive.to_str().unwrap(), "yesterday"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("yesterday"), "stderr: {stderr}");
}

#[test]
fn test_cli_missing_file() {
    let output = run(&["/nonexistent/__bzseek_test__.bz2", "2020-01-15"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot find the file"), "stderr: {stderr}");
}

// ── 4. Custom format argument ─────────────────────────────────────────────────

#[test]
fn test_cli_custom_format() {
    let dir = TempDir::new().unwrap();
    let text: String = (0..8)
        .map(|h| format!("15/01/2020 {h:02}:00:00 rotated\n"))
        .collect();
    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
    encoder.write_all(text.as_bytes()).unwrap();
    let path = dir.path().join("dmy.log.bz2");
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    let output = run(&[path.to_str().unwrap(), "15/01/2020", "%d/%m/%Y"]);
    assert!(output.status.success(), "status: {}", output.status);
    assert_eq!(String::from_utf8_lossy(&output.stdout), text);
}

// ── 5. Argument errors exit 2 ─────────────────────────────────────────────────

#[test]
fn test_cli_no_arguments_is_a_usage_error() {
    let output = run(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_unknown_flag_is_a_usage_error() {
    let output = run(&["--frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}

// ── 6. Help / version ─────────────────────────────────────────────────────────

#[test]
fn test_cli_help_and_version() {
    let help = run(&["--help"]);
    assert!(help.status.success());
    let stdout = String::from_utf8_lossy(&help.stdout);
    assert!(stdout.contains("--offset-only"), "help: {stdout}");

    let version = run(&["--version"]);
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains("bzseek"));
}
