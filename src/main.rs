//! Binary entry point for the `bzseek` command-line tool.
//!
//! Validates the archive path, runs the block-level seek, and either prints
//! the enclosing block's byte offsets or streams the matching lines to
//! stdout.  Exit codes: 0 on success, 1 on a domain error (bad archive,
//! unparseable date, date not found), 2 on an argument error (from clap).

use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bzseek::DateSeeker;

/// A small seeker for dates in bzip2-archived log files.
#[derive(Debug, Parser)]
#[command(name = "bzseek", version, about = "A small bz2-archived logs seeker.")]
struct Cli {
    /// Path of an archive, in which the date will be searched.
    #[arg(value_name = "FILE")]
    archive: PathBuf,

    /// Date for seeking.
    #[arg(value_name = "DATE")]
    date: String,

    /// Format of the date.
    #[arg(value_name = "FORMAT", default_value = "%Y-%m-%d")]
    date_format: String,

    /// Don't output lines with the date, show the block offsets only.
    #[arg(short = 'o', long = "offset-only")]
    offset_only: bool,

    /// Show the offsets in hex.
    #[arg(short = 'x', long = "hex")]
    hex: bool,
}

/// Report a domain error: one `ERROR:` line on stderr, exit code 1.
fn fail(message: impl Display) -> ExitCode {
    eprintln!("ERROR: {message}");
    ExitCode::from(1)
}

fn run(cli: &Cli) -> ExitCode {
    let mut seeker = match DateSeeker::open(&cli.archive, &cli.date_format) {
        Ok(seeker) => seeker,
        Err(e) => return fail(e),
    };

    let block = match seeker.seek(&cli.date, None) {
        Ok(Some(block)) => block,
        Ok(None) => return fail("cannot find the date in this archive"),
        Err(e) => return fail(e),
    };

    if cli.offset_only {
        let (start, end) = if cli.hex {
            (format!("{:#x}", block.start), format!("{:#x}", block.end))
        } else {
            (block.start.to_string(), block.end.to_string())
        };
        println!("Start offset of the block in the archive: {start}");
        println!("End offset of the block in the archive: {end}");
        return ExitCode::SUCCESS;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match seeker.output_date(&cli.date, block.start, None, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.archive.is_file() {
        return fail(format_args!(
            "cannot find the file: {}",
            cli.archive.display()
        ));
    }
    run(&cli)
}
