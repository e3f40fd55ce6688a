use criterion::{black_box, BatchSize, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};
use tempfile::tempdir;
use time::OffsetDateTime;

use sensorlog::{BufferedLog, LogConfig};

const APPENDS_PER_ITER: usize = 10_000;

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    for &buffer_size in &[1_usize, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(buffer_size),
            &buffer_size,
            |b, &buffer_size| {
                b.iter_batched(
                    || {
                        let dir = tempdir().expect("tempdir");
                        let config = LogConfig {
                            buffer_size,
                            max_size_mb: 1024.0,
                            ..LogConfig::new(dir.path())
                        };
                        let mut log = BufferedLog::new(config).expect("log");
                        log.start().expect("start");
                        (dir, log, OffsetDateTime::now_utc())
                    },
                    |(_dir, mut log, now)| {
                        for i in 0..APPENDS_PER_ITER {
                            log.log_reading("temp_1", now, black_box(i as f64), "°C")
                                .expect("append");
                        }
                        log.stop().expect("stop");
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    let config = LogConfig {
        buffer_size: 1000,
        rotate_after_lines: Some(APPENDS_PER_ITER as u64 / 4),
        ..LogConfig::new(dir.path())
    };
    let now = OffsetDateTime::now_utc();
    let mut log = BufferedLog::new(config).expect("log");
    log.start().expect("start");
    for i in 0..APPENDS_PER_ITER {
        log.log_reading("hum_2", now, i as f64, "%").expect("append");
    }
    log.stop().expect("stop");

    c.bench_function("read_logs", |b| {
        b.iter(|| black_box(log.read_logs(now, now, Some("hum_2")).entries().count()))
    });
}

criterion_group!(benches, bench_append, bench_read);
criterion_main!(benches);
