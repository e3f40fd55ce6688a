//! Age-based deletion of rotated archives.
//!
//! Runs after every rotation and from the `sweep` command. Compressed and
//! plain archives are judged by file mtime alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use time::OffsetDateTime;

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Regular files examined.
    pub scanned: usize,

    /// Files removed because they were older than the cutoff.
    pub deleted: Vec<PathBuf>,

    /// Failures that were skipped over.
    pub errors: Vec<String>,

    pub duration: Duration,
}

impl SweepStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record_error(&mut self, error: String) {
        log::warn!("retention: {error}");
        self.errors.push(error);
    }

    pub fn summary(&self) -> String {
        format!(
            "Scanned: {}, Deleted: {}, Errors: {}, Duration: {:?}",
            self.scanned,
            self.deleted.len(),
            self.errors.len(),
            self.duration
        )
    }
}

/// Cutoff instant for a retention window ending at `now`.
pub fn retention_cutoff(now: OffsetDateTime, retention: Duration) -> OffsetDateTime {
    now.checked_sub(time::Duration::try_from(retention).unwrap_or(time::Duration::MAX))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Deletes every regular file in `archive_dir` last modified strictly before
/// `now - retention`. A file modified exactly at the cutoff is kept.
///
/// Compressed and plain archives are treated alike. Failures are recorded in
/// the returned stats and never stop the sweep; a missing directory is an
/// empty sweep.
pub fn sweep_archives(archive_dir: &Path, retention: Duration, now: OffsetDateTime) -> SweepStats {
    sweep_with(archive_dir, retention, now, |path| fs::remove_file(path))
}

fn sweep_with<F>(
    archive_dir: &Path,
    retention: Duration,
    now: OffsetDateTime,
    mut remove: F,
) -> SweepStats
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let start = Instant::now();
    let mut stats = SweepStats::default();
    let cutoff = retention_cutoff(now, retention);

    let entries = match fs::read_dir(archive_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return stats,
        Err(err) => {
            stats.record_error(format!("{}: {err}", archive_dir.display()));
            return stats;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                stats.record_error(format!("{}: {err}", archive_dir.display()));
                continue;
            }
        };
        let path = entry.path();
        let modified = match entry.metadata().and_then(|meta| {
            if meta.is_file() {
                meta.modified().map(Some)
            } else {
                Ok(None)
            }
        }) {
            Ok(Some(modified)) => OffsetDateTime::from(modified),
            Ok(None) => continue,
            Err(err) => {
                stats.record_error(format!("{}: {err}", path.display()));
                continue;
            }
        };

        stats.scanned += 1;
        if modified >= cutoff {
            continue;
        }
        match remove(&path) {
            Ok(()) => {
                log::info!("retention: deleted {}", path.display());
                stats.deleted.push(path);
            }
            Err(err) => stats.record_error(format!("{}: {err}", path.display())),
        }
    }

    stats.deleted.sort();
    stats.duration = start.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;
    use time::macros::datetime;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn test_cutoff() {
        let now = datetime!(2025-01-10 12:00 UTC);
        assert_eq!(retention_cutoff(now, 2 * DAY), datetime!(2025-01-08 12:00 UTC));
        assert_eq!(retention_cutoff(now, Duration::MAX), OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_missing_dir_is_empty_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let stats = sweep_archives(&temp_dir.path().join("archive"), DAY, OffsetDateTime::now_utc());
        assert_eq!(stats.scanned, 0);
        assert!(!stats.has_errors());
    }

    #[test]
    fn test_sweeps_only_old_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a_1.csv.gz"), b"x").unwrap();
        fs::write(dir.join("b_1.csv"), b"y").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();

        // Files were just written, so a sweep at "now" keeps them.
        let stats = sweep_archives(dir, DAY, OffsetDateTime::now_utc());
        assert_eq!(stats.scanned, 2);
        assert!(stats.deleted.is_empty());

        // Two days later, both are past a one-day window.
        let later = OffsetDateTime::now_utc() + 2 * DAY;
        let stats = sweep_archives(dir, DAY, later);
        assert_eq!(stats.deleted, vec![dir.join("a_1.csv.gz"), dir.join("b_1.csv")]);
        assert!(dir.join("nested").exists());
        assert!(stats.summary().contains("Deleted: 2"));
    }

    fn touch(path: &Path, at: OffsetDateTime) {
        let file = File::create(path).unwrap();
        file.set_modified(at.into()).unwrap();
    }

    #[test]
    fn test_file_at_cutoff_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let now = datetime!(2025-01-10 12:00 UTC);
        let cutoff = retention_cutoff(now, DAY);
        touch(&dir.join("at_cutoff.csv.gz"), cutoff);
        touch(&dir.join("older.csv.gz"), cutoff - Duration::from_secs(1));
        touch(&dir.join("newer.csv"), cutoff + Duration::from_secs(1));

        let stats = sweep_archives(dir, DAY, now);
        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.deleted, vec![dir.join("older.csv.gz")]);
        assert!(dir.join("at_cutoff.csv.gz").exists());
        assert!(dir.join("newer.csv").exists());
    }

    #[test]
    fn test_failed_delete_does_not_stop_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let now = datetime!(2025-01-10 12:00 UTC);
        let old = now - 3 * DAY;
        touch(&dir.join("locked.csv.gz"), old);
        touch(&dir.join("free.csv.gz"), old);

        let stats = sweep_with(dir, DAY, now, |path| {
            if path.ends_with("locked.csv.gz") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                fs::remove_file(path)
            }
        });
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("locked"));
        assert_eq!(stats.deleted, vec![dir.join("free.csv.gz")]);
        assert!(dir.join("locked.csv.gz").exists());
        assert!(!dir.join("free.csv.gz").exists());
    }
}
