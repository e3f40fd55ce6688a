//! Rotated file archiving.
//!
//! A rotated data file is compressed into a single-member gzip stream whose
//! header records the original base name. The archive is written to a
//! temporary name, verified, and renamed into place; the plaintext file is
//! removed only after that. If compression fails the plaintext file is moved
//! into the archive directory instead, so rotation still completes.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::{Error, Result};
use crate::pattern::DATA_EXTENSION;

/// Extension of compressed archives.
pub const ARCHIVE_EXTENSION: &str = "gz";

const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]_[subsecond digits:6]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// gzip container holding the data file.
    Compressed,
    /// The data file moved as-is after compression failed.
    Plain,
}

#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub path: PathBuf,
    pub kind: ArchiveKind,
    pub original_size: u64,
    pub archived_size: u64,
}

/// Renders a rotation instant as `YYYYmmdd_HHMMSS_ffffff` in UTC.
pub fn rotation_stamp(at: OffsetDateTime) -> Result<String> {
    Ok(at.to_offset(UtcOffset::UTC).format(STAMP_FORMAT)?)
}

/// Archive file name for `base_name` rotated under `stamp`.
///
/// `sensors_20250101.csv` + `20250101_153000_000000` gives
/// `sensors_20250101_20250101_153000_000000.csv.gz`.
pub fn archive_name(base_name: &str, stamp: &str, kind: ArchiveKind) -> String {
    let stem = base_name
        .strip_suffix(&format!(".{DATA_EXTENSION}"))
        .unwrap_or(base_name);
    match kind {
        ArchiveKind::Compressed => {
            format!("{stem}_{stamp}.{DATA_EXTENSION}.{ARCHIVE_EXTENSION}")
        }
        ArchiveKind::Plain => format!("{stem}_{stamp}.{DATA_EXTENSION}"),
    }
}

/// Archives the closed data file at `src` into `archive_dir`.
///
/// On success `src` no longer exists.
pub fn archive_file(
    src: &Path,
    archive_dir: &Path,
    rotated_at: OffsetDateTime,
) -> Result<ArchiveOutcome> {
    archive_with(src, archive_dir, rotated_at, compress_into)
}

fn archive_with<F>(
    src: &Path,
    archive_dir: &Path,
    rotated_at: OffsetDateTime,
    compress: F,
) -> Result<ArchiveOutcome>
where
    F: FnOnce(&Path, &Path, &str, OffsetDateTime) -> Result<()>,
{
    let base_name = src
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a data file: {}", src.display()),
            ))
        })?
        .to_string();
    let original_size = fs::metadata(src)?.len();
    fs::create_dir_all(archive_dir)?;

    let stamp = rotation_stamp(rotated_at)?;
    let dest = unique_path(archive_dir, &base_name, &stamp, ArchiveKind::Compressed);
    let tmp = dest.with_extension(format!("{ARCHIVE_EXTENSION}.tmp"));
    let _ = fs::remove_file(&tmp);

    let compressed = compress(src, &tmp, &base_name, rotated_at)
        .and_then(|()| verify(&tmp, original_size))
        .and_then(|()| fs::rename(&tmp, &dest).map_err(Error::from));

    match compressed {
        Ok(()) => {
            let archived_size = fs::metadata(&dest)?.len();
            // Only remove the original once the archive is durable.
            fs::remove_file(src)?;
            log::info!(
                "archived {} -> {} ({} -> {} bytes)",
                src.display(),
                dest.display(),
                original_size,
                archived_size
            );
            Ok(ArchiveOutcome {
                path: dest,
                kind: ArchiveKind::Compressed,
                original_size,
                archived_size,
            })
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            let plain = unique_path(archive_dir, &base_name, &stamp, ArchiveKind::Plain);
            log::warn!(
                "compressing {} failed ({err}); keeping it uncompressed as {}",
                src.display(),
                plain.display()
            );
            fs::rename(src, &plain)?;
            Ok(ArchiveOutcome {
                path: plain,
                kind: ArchiveKind::Plain,
                original_size,
                archived_size: original_size,
            })
        }
    }
}

fn unique_path(archive_dir: &Path, base_name: &str, stamp: &str, kind: ArchiveKind) -> PathBuf {
    let mut path = archive_dir.join(archive_name(base_name, stamp, kind));
    let mut n = 1u32;
    while path.exists() {
        path = archive_dir.join(archive_name(base_name, &format!("{stamp}-{n}"), kind));
        n += 1;
    }
    path
}

fn compress_into(
    src: &Path,
    dest: &Path,
    base_name: &str,
    rotated_at: OffsetDateTime,
) -> Result<()> {
    let mut input = BufReader::new(File::open(src)?);
    let output = BufWriter::new(File::create(dest)?);
    let mtime = u32::try_from(rotated_at.unix_timestamp()).unwrap_or(0);
    let mut encoder = GzBuilder::new()
        .filename(base_name)
        .mtime(mtime)
        .write(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let output = encoder.finish()?;
    let file = output.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Decompresses the archive and checks it yields exactly `expected` bytes.
fn verify(path: &Path, expected: u64) -> Result<()> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let actual = io::copy(&mut decoder, &mut io::sink())?;
    if actual != expected {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "archive {} holds {actual} bytes, expected {expected}",
                path.display()
            ),
        )));
    }
    Ok(())
}
