use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

/// In-progress files start with a dot so directory scans skip them.
const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path:?} unusable: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if needed and checks that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".to_string())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| unusable(e.to_string()))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    partial_file(dir).map_err(|e| unusable(e.to_string()))?;
    Ok(())
}

/// Writes `{dir}/{filename}` so that readers see the old file or the complete
/// new one, never a prefix: temp file, fsync, rename, fsync of the directory.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut partial = partial_file(&self.dir)?;
        partial.write_all(content)?;
        partial.as_file().sync_all()?;
        // `persist` renames over an existing file.
        partial.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        sync_dir(&self.dir)?;
        Ok(target)
    }
}

fn partial_file(dir: &Path) -> io::Result<NamedTempFile> {
    Builder::new().prefix(PARTIAL_PREFIX).tempfile_in(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
