//! Zip container writer.
//!
//! Writes an ordered list of [`PackageEntry`] values into a zip archive. The
//! caller decides the order and the per-entry compression (see
//! [`crate::manifest`]); this module enforces the two container rules that
//! make an e-book unreadable when violated:
//!
//! - an entry named `mimetype` must come first and be stored
//! - no other entry may be named `mimetype`
//!
//! ## Publishing
//!
//! The archive is written to a temp file in the output's directory and only
//! persisted over the output path once every entry has been added and the
//! central directory written. Any failure drops the temp file, leaving a
//! previous archive at the output path untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MIMETYPE_ENTRY: &str = "mimetype";

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("zip error on {entry}: {source}")]
    Zip {
        entry: String,
        source: zip::result::ZipError,
    },
    #[error("mimetype entry must be the first entry and stored, found it at position {position}")]
    MimetypeOrder { position: usize },
    #[error("{entry}: source file missing at {}", file.display())]
    MissingSource { entry: String, file: PathBuf },
}

/// How an entry's bytes are stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflated,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// One archive member: its name inside the archive and the file it is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageEntry {
    pub name: String,
    pub source: PathBuf,
    pub compression: Compression,
}

impl PackageEntry {
    pub fn stored(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            compression: Compression::Stored,
        }
    }

    pub fn deflated(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            compression: Compression::Deflated,
        }
    }
}

/// Check the mimetype rules before any byte is written.
pub fn check_order(entries: &[PackageEntry]) -> Result<(), PackageError> {
    for (position, entry) in entries.iter().enumerate() {
        if entry.name != MIMETYPE_ENTRY {
            continue;
        }
        if position != 0 || entry.compression != Compression::Stored {
            return Err(PackageError::MimetypeOrder { position });
        }
    }
    Ok(())
}

/// Write `entries` in order to a zip archive at `output`.
///
/// Returns the number of entries written.
pub fn write_archive(entries: &[PackageEntry], output: &Path) -> Result<usize, PackageError> {
    check_order(entries)?;
    for entry in entries {
        if !entry.source.is_file() {
            return Err(PackageError::MissingSource {
                entry: entry.name.clone(),
                file: entry.source.clone(),
            });
        }
    }

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| PackageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let tmp = NamedTempFile::new_in(dir).map_err(|source| PackageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    write_entries(entries, tmp.as_file())?;
    tmp.as_file().sync_all().map_err(|source| PackageError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    tmp.persist(output).map_err(|e| PackageError::Io {
        path: output.to_path_buf(),
        source: e.error,
    })?;

    tracing::info!(path = %output.display(), entries = entries.len(), "wrote archive");
    Ok(entries.len())
}

/// Stream every entry into `file` and write the central directory. The
/// writer is dropped on return, releasing its borrow of `file`.
fn write_entries(entries: &[PackageEntry], file: &fs::File) -> Result<(), PackageError> {
    let mut zip = ZipWriter::new(file);
    for entry in entries {
        let options = FileOptions::default().compression_method(entry.compression.method());
        zip.start_file(entry.name.as_str(), options)
            .map_err(|source| PackageError::Zip {
                entry: entry.name.clone(),
                source,
            })?;
        let mut input = fs::File::open(&entry.source).map_err(|source| PackageError::Io {
            path: entry.source.clone(),
            source,
        })?;
        io::copy(&mut input, &mut zip).map_err(|source| PackageError::Io {
            path: entry.source.clone(),
            source,
        })?;
        tracing::trace!(entry = %entry.name, "added archive entry");
    }
    zip.finish().map_err(|source| PackageError::Zip {
        entry: "central directory".to_string(),
        source,
    })?;
    Ok(())
}
