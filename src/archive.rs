//! Unpacking release archives into a throwaway staging directory.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use flate2::read::GzDecoder;
use tempfile::TempDir;
use tracing::debug;
use crate::error::{FormulaError, Result};
use crate::merge::Component;

/// An extracted archive. The staging directory is removed on drop.
#[derive(Debug)]
pub struct StagedArchive {
    _dir: TempDir,
    root: PathBuf,
}

impl StagedArchive {
    /// Extracts a `.tar.gz` archive into a fresh directory under the system
    /// temp dir.
    pub fn unpack(archive: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("rust-beta-")
            .tempdir()
            .map_err(|e| FormulaError::fs(std::env::temp_dir(), e))?;
        Self::unpack_into(archive, dir)
    }

    /// Like [`StagedArchive::unpack`], with the staging directory under `parent`.
    pub fn unpack_in(archive: &Path, parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent).map_err(|e| FormulaError::fs(parent, e))?;
        let dir = TempDir::new_in(parent).map_err(|e| FormulaError::fs(parent, e))?;
        Self::unpack_into(archive, dir)
    }

    fn unpack_into(archive: &Path, dir: TempDir) -> Result<Self> {
        let file = File::open(archive).map_err(|e| FormulaError::fs(archive, e))?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_preserve_permissions(true);
        tar.unpack(dir.path())
            .map_err(|e| FormulaError::Archive(format!("{}: {e}", archive.display())))?;

        let root = single_top_level_dir(dir.path())?.unwrap_or_else(|| dir.path().to_path_buf());
        debug!("unpacked {} to {}", archive.display(), root.display());
        Ok(Self { _dir: dir, root })
    }

    /// Directory holding the component subtrees.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up one named component subtree.
    pub fn component(&self, name: &str) -> Result<Component> {
        let root = self.root.join(name);
        if !root.is_dir() {
            return Err(FormulaError::fs(
                root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("component {name} missing from archive"),
                ),
            ));
        }
        Ok(Component { name: name.to_string(), root })
    }
}

/// Release archives wrap everything in one `rust-<version>-<target>/`
/// directory. Returns it when that is the only entry.
fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| FormulaError::fs(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| FormulaError::fs(dir, e))?;
    match entries.as_slice() {
        [only] if only.path().is_dir() => Ok(Some(only.path())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn unpack_descends_into_single_top_level_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("rust.tar.gz");
        write_archive(
            &archive,
            &[
                ("rust-1.0.0-x/rustc/bin/rustc", b"bin"),
                ("rust-1.0.0-x/cargo/bin/cargo", b"bin"),
            ],
        );

        let staged = StagedArchive::unpack_in(&archive, &dir.path().join("stage")).unwrap();
        assert!(staged.root().ends_with("rust-1.0.0-x"));
        let rustc = staged.component("rustc").unwrap();
        assert!(rustc.root.join("bin/rustc").is_file());
        assert!(staged.component("rust-docs").is_err());
    }

    #[test]
    fn garbage_is_archive_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();
        assert!(matches!(
            StagedArchive::unpack_in(&archive, dir.path()),
            Err(FormulaError::Archive(_))
        ));
    }
}
