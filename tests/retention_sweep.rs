use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use time::OffsetDateTime;

use sensorlog::{sweep_archives, BufferedLog, LogConfig, ManualClock};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[test]
fn sweep_removes_only_expired_archives() {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("archive");
    fs::create_dir_all(archive.join("nested")).expect("archive dir");
    fs::write(archive.join("a_20250101_000000_000000.csv.gz"), b"gz").expect("gz");
    fs::write(archive.join("b_20250101_000000_000000.csv"), b"plain").expect("plain");

    let now = OffsetDateTime::now_utc();
    let kept = sweep_archives(&archive, 7 * DAY, now);
    assert_eq!(kept.scanned, 2);
    assert!(kept.deleted.is_empty());
    assert!(!kept.has_errors());

    let later = sweep_archives(&archive, 7 * DAY, now + 8 * DAY);
    assert_eq!(later.deleted.len(), 2);
    assert!(!later.has_errors());
    assert!(archive.join("nested").is_dir());
    assert_eq!(fs::read_dir(&archive).expect("list").count(), 1);
}

#[test]
fn rotation_sweeps_archives_past_retention() {
    let dir = tempdir().expect("tempdir");
    let config = LogConfig {
        buffer_size: 1,
        retention_days: 1.0,
        ..LogConfig::new(dir.path())
    };
    let start = OffsetDateTime::now_utc();
    let clock = ManualClock::new(start);
    let mut log = BufferedLog::with_clock(config, clock.clone()).expect("log");
    log.start().expect("start");

    log.log_reading("temp_1", start, 19.0, "°C").expect("log");
    let old = log.rotate().expect("rotate").expect("archived");
    assert!(old.path.exists());

    clock.advance(2 * DAY);
    log.log_reading("temp_1", start + 2 * DAY, 19.5, "°C").expect("log");
    assert_eq!(log.rotations(), 2);
    assert!(!old.path.exists());
    log.stop().expect("stop");
}
