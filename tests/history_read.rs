use std::fs::{self, File};
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;
use time::macros::datetime;

use sensorlog::reader::{discover_sources, SourceKind};
use sensorlog::{read_logs, Error, LogEntry};

const HEADER_ROW: &str = "timestamp;source_id;value;unit\n";

#[test]
fn short_rows_are_skipped() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("sensors_20250101.csv"),
        format!(
            "{HEADER_ROW}\
             2025-01-01 10:00:00.000000;temp_1;20.5;°C\n\
             2025-01-01 10:00:01.000000;temp_1;20.6\n\
             not a timestamp;temp_1;20.7;°C\n\
             2025-01-01 10:00:03.000000;temp_1;abc;°C\n\
             2025-01-01 10:00:04.000000;temp_1;20.9;°C;extra\n\
             2025-01-01 10:00:05.000000;temp_1;21.0;°C\n"
        ),
    )
    .expect("write live file");

    let read: Vec<_> = read_logs(
        dir.path(),
        datetime!(2025-01-01 0:00 UTC),
        datetime!(2025-01-02 0:00 UTC),
        None,
    )
    .collect::<Result<_, _>>()
    .expect("malformed rows are not errors");
    assert_eq!(
        read,
        vec![
            LogEntry::new("temp_1", datetime!(2025-01-01 10:00 UTC), 20.5, "°C"),
            LogEntry::new("temp_1", datetime!(2025-01-01 10:00:05 UTC), 21.0, "°C"),
        ]
    );
}

#[test]
fn reads_live_then_compressed_then_plain() {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("archive");
    fs::create_dir_all(&archive).expect("archive dir");

    fs::write(
        dir.path().join("sensors_20250103.csv"),
        format!("{HEADER_ROW}2025-01-03 00:00:00.000000;s1;3;V\n"),
    )
    .expect("live");
    let mut encoder = GzEncoder::new(
        File::create(archive.join("sensors_20250101_20250102_000000_000000.csv.gz"))
            .expect("create gz"),
        Compression::default(),
    );
    encoder
        .write_all(format!("{HEADER_ROW}2025-01-01 00:00:00.000000;s1;1;V\n").as_bytes())
        .expect("write gz");
    encoder.finish().expect("finish gz");
    fs::write(
        archive.join("sensors_20250102_20250103_000000_000000.csv"),
        format!("{HEADER_ROW}2025-01-02 00:00:00.000000;s1;2;V\n2025-01-02 00:00:00.000000;s2;9;V\n"),
    )
    .expect("plain");
    fs::write(archive.join("notes.txt"), "ignored").expect("stray file");

    let kinds: Vec<_> = discover_sources(dir.path())
        .expect("discover")
        .into_iter()
        .map(|source| source.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![SourceKind::Live, SourceKind::Compressed, SourceKind::Plain]
    );

    let values: Vec<f64> = read_logs(
        dir.path(),
        datetime!(2025-01-01 0:00 UTC),
        datetime!(2025-01-03 0:00 UTC),
        Some("s1"),
    )
    .entries()
    .map(|entry| entry.value)
    .collect();
    assert_eq!(values, vec![3.0, 1.0, 2.0]);
}

#[test]
fn corrupt_archive_does_not_hide_other_files() {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("archive");
    fs::create_dir_all(&archive).expect("archive dir");
    fs::write(archive.join("broken_20250101_000000_000000.csv.gz"), b"not gzip at all")
        .expect("broken archive");
    fs::write(
        archive.join("kept_20250101_000000_000000.csv"),
        format!("{HEADER_ROW}2025-01-01 00:00:00.000000;s1;1;V\n"),
    )
    .expect("plain archive");

    let items: Vec<_> = read_logs(
        dir.path(),
        datetime!(2025-01-01 0:00 UTC),
        datetime!(2025-01-01 0:00 UTC),
        None,
    )
    .collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Err(Error::ReadFile { path, .. }) if path.ends_with("broken_20250101_000000_000000.csv.gz")));
    assert!(matches!(&items[1], Ok(entry) if entry.value == 1.0));
}

#[test]
fn missing_log_dir_reads_nothing() {
    let dir = tempdir().expect("tempdir");
    let count = read_logs(
        dir.path().join("absent"),
        datetime!(2025-01-01 0:00 UTC),
        datetime!(2025-01-02 0:00 UTC),
        None,
    )
    .count();
    assert_eq!(count, 0);
}
