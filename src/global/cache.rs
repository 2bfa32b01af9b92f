use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{FormulaError, Result};
use crate::util::url_filename;

/// Downloaded release archives, keyed by the file name of their URL.
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    dir: PathBuf,
}

impl ArchiveCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the archive for `url` is (or would be) stored.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(url_filename(url))
    }

    pub fn get_cached_archive(&self, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url);
        path.is_file().then_some(path)
    }

    /// Stores `bytes` for `url`. The write goes through a temporary file in
    /// the cache directory, so an interrupted run never leaves a truncated
    /// archive behind.
    pub fn cache_archive(&self, url: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| FormulaError::fs(&self.dir, e))?;
        let path = self.path_for(url);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| FormulaError::fs(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| FormulaError::fs(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| FormulaError::fs(&path, e.error))?;
        debug!("cached {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    pub fn remove_cached_archive(&self, url: &str) -> Result<()> {
        let path = self.path_for(url);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| FormulaError::fs(&path, e))?;
        }
        Ok(())
    }

    /// Empties the cache, returning how many archives were removed.
    pub fn clean_cache(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FormulaError::fs(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| FormulaError::fs(&self.dir, e))?.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| FormulaError::fs(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
