//! Criterion benchmarks for pattern translation and block-level seeking.
//!
//! Run with:
//!   cargo bench --bench seek

use std::hint::black_box;
use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use bzseek::{format_to_regex, DateFormat, DateSeeker, Locale};

fn bench_pattern_translation(c: &mut Criterion) {
    let locale = Locale::default();
    let mut group = c.benchmark_group("pattern");

    group.bench_function("format_to_regex_simple", |b| {
        b.iter(|| format_to_regex(black_box("%Y-%m-%d %H:%M:%S"), &locale))
    });
    group.bench_function("format_to_regex_composite", |b| {
        b.iter(|| format_to_regex(black_box("%c"), &locale))
    });
    group.bench_function("date_format_compile", |b| {
        b.iter(|| DateFormat::new(black_box("%Y-%m-%d"), &locale).unwrap())
    });

    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    // A January of hourly log lines, four days per compressed block.
    let dir = TempDir::new().unwrap();
    let mut bytes = Vec::new();
    for chunk_index in 0u32..8 {
        let first = 1 + chunk_index * 4;
        let last = (first + 3).min(31);
        let chunk: String = (first..=last)
            .flat_map(|day| {
                (0..24).map(move |hour| {
                    format!("2020-01-{day:02} {hour:02}:00:00 payload line\n")
                })
            })
            .collect();
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(1));
        encoder.write_all(chunk.as_bytes()).unwrap();
        bytes.extend_from_slice(&encoder.finish().unwrap());
    }
    let path = dir.path().join("bench.log.bz2");
    std::fs::write(&path, bytes).unwrap();

    let mut group = c.benchmark_group("seek");
    group.bench_function("seek_mid_month", |b| {
        let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
        b.iter(|| seeker.seek(black_box("2020-01-15"), None).unwrap())
    });
    group.bench_function("seek_miss", |b| {
        let mut seeker = DateSeeker::open(&path, "%Y-%m-%d").unwrap();
        b.iter(|| seeker.seek(black_box("2020-02-01"), None).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_pattern_translation, bench_seek);
criterion_main!(benches);
