//! The one temporary file that holds the current upload.
//!
//! Nothing guarantees the file goes away on its own, so it is removed on
//! clear, on a rejected upload, and swept at startup in case an earlier
//! process died with one on disk.

use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use uuid::Uuid;

const FILE_PREFIX: &str = "pdf_qa-upload-";

fn upload_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^pdf_qa-upload-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.pdf$")
            .expect("upload file pattern is valid")
    })
}

#[derive(Debug)]
pub struct UploadStore {
    dir: PathBuf,
    path: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, session_id: Uuid) -> Self {
        let dir = dir.into();
        let path = dir.join(format!("{FILE_PREFIX}{session_id}.pdf"));
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write `bytes` to the upload path, replacing any previous upload.
    ///
    /// The data goes to a scratch file in the same directory first and is
    /// renamed into place, so a failed write never leaves a partial upload.
    pub fn persist(&self, bytes: &[u8]) -> io::Result<&Path> {
        fs::create_dir_all(&self.dir)?;
        let mut scratch = NamedTempFile::new_in(&self.dir)?;
        scratch.write_all(bytes)?;
        scratch.flush()?;
        scratch.persist(&self.path).map_err(|e| e.error)?;

        log::debug!("Stored upload at {}", self.path.display());
        Ok(&self.path)
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Delete the upload. Returns whether a file was actually removed.
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("Removed upload {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove upload files left behind in `dir` by earlier sessions.
    /// Returns how many were deleted; unrelated files are left alone.
    pub fn sweep_stale(dir: &Path) -> io::Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let matches = name
                .to_str()
                .map(|n| upload_file_pattern().is_match(n))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove stale upload {:?}: {}", name, e),
            }
        }

        if removed > 0 {
            log::info!("Removed {} stale upload file(s) from {}", removed, dir.display());
        }
        Ok(removed)
    }
}
