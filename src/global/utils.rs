use std::path::PathBuf;
use directories::ProjectDirs;
use crate::error::{FormulaError, Result};

/// Default directory holding every installed formula (`<root>/<name>/<version>`).
pub fn get_global_root_dir() -> Result<PathBuf> {
    let (_, data_dir) = get_global_dirs()?;
    Ok(data_dir.join("Cellar"))
}

/// Default directory for downloaded release archives.
pub fn get_global_cache_dir() -> Result<PathBuf> {
    let (cache_dir, _) = get_global_dirs()?;
    Ok(cache_dir.join("downloads"))
}

pub fn get_global_dirs() -> Result<(PathBuf, PathBuf)> {
    let proj_dirs = ProjectDirs::from("org", "rust-lang", "rust-beta").ok_or_else(|| {
        FormulaError::Config(
            "could not determine the user's data and cache directories; pass --root and --cache-dir"
                .to_string(),
        )
    })?;

    let cache_dir = proj_dirs.cache_dir().to_path_buf();
    let data_dir = proj_dirs.data_dir().to_path_buf();

    Ok((cache_dir, data_dir))
}
