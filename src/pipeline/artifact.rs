//! Atomic artifact writes: temp file in the destination directory, then rename.
//!
//! ## Why this matters
//!
//! Every stage is skipped when its output file exists. A half-written
//! transcript left behind by a crash or a killed tool would therefore be
//! treated as complete on the next run and poison every later stage. Writing
//! to a hidden temp file in the same directory and renaming it into place
//! means the final name only ever appears with complete contents.
//!
//! The temp file lives next to the destination (never in `/tmp`) so the
//! rename stays on one filesystem and is atomic. Temp names start with
//! [`TEMP_PREFIX`]; discovery ignores them, and a [`PendingArtifact`] that is
//! dropped without [`PendingArtifact::commit`] removes its file.

use crate::error::StageError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// File-name prefix of every in-progress artifact.
pub const TEMP_PREFIX: &str = ".studygen-";
/// Default suffix of in-progress artifacts.
pub const TEMP_SUFFIX: &str = ".part";

/// A reserved temp path that becomes `dest` on [`commit`](Self::commit).
///
/// External tools (ffmpeg, pandoc) are pointed at [`path`](Self::path) and
/// write there; the rename happens only once they have exited successfully.
#[derive(Debug)]
pub struct PendingArtifact {
    temp: TempPath,
    dest: PathBuf,
}

impl PendingArtifact {
    /// Reserve a temp file beside `dest` with the default `.part` suffix.
    pub fn new(dest: &Path) -> Result<Self, StageError> {
        Self::with_suffix(dest, TEMP_SUFFIX)
    }

    /// Reserve a temp file beside `dest` with a specific suffix.
    ///
    /// Some tools pick their output format from the file extension (pandoc
    /// needs `.pdf`), so the suffix is configurable.
    pub fn with_suffix(dest: &Path, suffix: &str) -> Result<Self, StageError> {
        let dir = parent_dir(dest);
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)
            .map_err(|e| StageError::ArtifactWrite {
                path: dest.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            temp: file.into_temp_path(),
            dest: dest.to_path_buf(),
        })
    }

    /// Where the producer should write.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Final destination.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Rename the temp file onto the destination.
    ///
    /// # Errors
    /// [`StageError::ArtifactWrite`] if the producer left an empty file or
    /// the rename fails. In both cases the temp file is removed.
    pub fn commit(self) -> Result<PathBuf, StageError> {
        let len = std::fs::metadata(&self.temp).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(StageError::ArtifactWrite {
                path: self.dest,
                source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "producer wrote no data"),
            });
        }

        let Self { temp, dest } = self;
        temp.persist(&dest).map_err(|e| StageError::ArtifactWrite {
            path: dest.clone(),
            source: e.error,
        })?;
        debug!("Committed {} ({} bytes)", dest.display(), len);
        Ok(dest)
    }
}

/// Write `contents` to `dest` atomically.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> Result<(), StageError> {
    let dir = parent_dir(dest);
    let wrap = |e: std::io::Error| StageError::ArtifactWrite {
        path: dest.to_path_buf(),
        source: e,
    };

    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(wrap)?;
    file.write_all(contents).map_err(wrap)?;
    file.as_file().sync_all().map_err(wrap)?;
    file.persist(dest).map_err(|e| wrap(e.error))?;

    debug!("Wrote {} ({} bytes)", dest.display(), contents.len());
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
