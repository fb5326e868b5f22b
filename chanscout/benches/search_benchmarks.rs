use chanscout::metrics::ScanMetrics;
use chanscout::results::ParentArchive;
use chanscout::search::extract::extract;
use chanscout::search::{ArchiveKind, FileFormat, FileProcessor, PatternMatcher};
use chanscout::ResultSink;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn sample_text(lines: usize) -> String {
    (0..lines)
        .map(|j| format!("Line {} TODO: fix bug {} FIXME: optimize NOTE: task {}\n", j, j, j))
        .collect()
}

fn count_matches(format: FileFormat, bytes: &[u8], matcher: &PatternMatcher) -> usize {
    extract(format, bytes)
        .map(|chunks| {
            chunks
                .filter_map(Result::ok)
                .filter(|chunk| matcher.is_match(&chunk.text))
                .count()
        })
        .unwrap_or(0)
}

fn bench_patterns(c: &mut Criterion) {
    let text = sample_text(10_000);
    let patterns = [("simple", "todo"), ("regex", r"fixme:.*optimize"), ("digits", r"bug \d{4}")];

    let mut group = c.benchmark_group("plain_text");
    for (label, pattern) in patterns {
        let matcher = PatternMatcher::new(pattern).unwrap();
        group.bench_function(label, |b| {
            b.iter(|| count_matches(FileFormat::PlainText, black_box(text.as_bytes()), &matcher))
        });
    }
    group.finish();
}

fn bench_formats(c: &mut Criterion) {
    let text = sample_text(10_000);
    let matcher = PatternMatcher::new("todo").unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    let gzipped = encoder.finish().unwrap();
    let csv = text.replace(' ', ",");

    c.bench_function("gzip_text", |b| {
        b.iter(|| count_matches(FileFormat::GzipText, black_box(gzipped.as_slice()), &matcher))
    });
    c.bench_function("csv", |b| {
        b.iter(|| count_matches(FileFormat::Csv, black_box(csv.as_bytes()), &matcher))
    });
}

fn bench_archive_walk(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..20 {
        writer
            .start_file(format!("member_{}.txt", i), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(sample_text(500).as_bytes()).unwrap();
    }
    let archive_path = dir.path().join("bundle.zip");
    std::fs::write(&archive_path, writer.finish().unwrap().into_inner()).unwrap();

    let processor = FileProcessor::new(
        PatternMatcher::new("absent-term").unwrap(),
        ResultSink::new(dir.path().join("results.txt"), dir.path().join("errors.txt")),
        ScanMetrics::new(),
        16,
    );
    let parent = ParentArchive::new(1, "bundle.zip");

    c.bench_function("zip_archive_walk", |b| {
        b.iter(|| {
            processor
                .search_archive(black_box(&archive_path), ArchiveKind::Zip, &parent)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_patterns, bench_formats, bench_archive_walk);
criterion_main!(benches);
