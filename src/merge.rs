//! Merging unpacked components into an installation prefix.
//!
//! Nothing already present under the prefix is ever replaced: directories that
//! exist are reused, files and links that exist are skipped. Components merged
//! earlier therefore win over later ones on colliding paths.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;
use crate::error::{FormulaError, Result};

/// One independently archived subtree of the toolchain, unpacked on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub root: PathBuf,
}

/// What a merge did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub dirs_created: usize,
    /// Files and links moved into the prefix, relative to it.
    pub moved: Vec<PathBuf>,
    pub skipped: usize,
}

impl MergeReport {
    /// Whether this merge put `rel` in place, as opposed to finding it there.
    pub fn installed(&self, rel: &Path) -> bool {
        self.moved.iter().any(|p| p == rel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Symlink,
}

struct DirEntry {
    rel: PathBuf,
    mode: u32,
}

struct FileEntry {
    rel: PathBuf,
    kind: EntryKind,
}

/// Moves a component's tree into `prefix`.
///
/// Directories are created first, shallowest first, carrying the source
/// directory's permission bits. Files and symbolic links are then moved into
/// place unless the destination path already exists. Moves work across
/// filesystems.
///
/// # Errors
///
/// Fails before touching the prefix if the component root is missing or not a
/// directory. A failing move stops the merge; entries already moved stay where
/// they are and directories created so far still get their source modes.
pub fn merge_component(component: &Component, prefix: &Path) -> Result<MergeReport> {
    let root = component.root.as_path();
    let meta = fs::metadata(root).map_err(|e| FormulaError::fs(root, e))?;
    if !meta.is_dir() {
        return Err(FormulaError::fs(
            root,
            std::io::Error::new(ErrorKind::NotADirectory, "component root is not a directory"),
        ));
    }
    fs::create_dir_all(prefix).map_err(|e| FormulaError::fs(prefix, e))?;

    let (mut dirs, files) = scan(root)?;
    sort_dirs(&mut dirs);

    let mut report = MergeReport::default();
    let mut created = Vec::new();
    let placed = place_entries(root, prefix, &dirs, &files, &mut created, &mut report);

    // Created writable so files could land in them; tighten afterwards.
    let tightened = created
        .iter()
        .rev()
        .try_for_each(|(dest, mode)| apply_mode(dest, *mode));
    placed?;
    tightened?;

    debug!(
        component = %component.name,
        dirs = report.dirs_created,
        moved = report.moved.len(),
        skipped = report.skipped,
        "merged into {}",
        prefix.display()
    );
    Ok(report)
}

/// Creates missing directories, then moves every file and link whose
/// destination is free. Each created directory is pushed onto `created` as
/// soon as it exists.
fn place_entries(
    root: &Path,
    prefix: &Path,
    dirs: &[DirEntry],
    files: &[FileEntry],
    created: &mut Vec<(PathBuf, u32)>,
    report: &mut MergeReport,
) -> Result<()> {
    for dir in dirs {
        let dest = prefix.join(&dir.rel);
        if path_exists(&dest) {
            continue;
        }
        create_dir(&dest, dir.mode)?;
        created.push((dest, dir.mode));
        report.dirs_created += 1;
    }

    for file in files {
        let dest = prefix.join(&file.rel);
        if path_exists(&dest) {
            trace!("{} exists, skipping", dest.display());
            report.skipped += 1;
            continue;
        }
        relocate(&root.join(&file.rel), &dest, file.kind)?;
        report.moved.push(file.rel.clone());
    }
    Ok(())
}

/// Walks `root` without following links, splitting directories from
/// everything else.
fn scan(root: &Path) -> Result<(Vec<DirEntry>, Vec<FileEntry>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            FormulaError::fs(path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());
        let file_type = entry.file_type();
        if file_type.is_dir() {
            let meta = entry.metadata().map_err(|e| {
                FormulaError::fs(entry.path(), e.into())
            })?;
            dirs.push(DirEntry { rel, mode: mode_of(&meta) });
        } else {
            let kind = if file_type.is_symlink() { EntryKind::Symlink } else { EntryKind::File };
            files.push(FileEntry { rel, kind });
        }
    }
    Ok((dirs, files))
}

/// Parents before children: by segment count, then component-wise.
fn sort_dirs(dirs: &mut [DirEntry]) {
    dirs.sort_by(|a, b| {
        let depth = |p: &Path| p.components().count();
        depth(&a.rel).cmp(&depth(&b.rel)).then_with(|| a.rel.cmp(&b.rel))
    });
}

/// Existence without following links, so a dangling link still counts.
fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn relocate(src: &Path, dest: &Path, kind: EntryKind) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            trace!("{} crosses devices, copying", src.display());
            copy_then_remove(src, dest, kind)
        }
        Err(e) => Err(FormulaError::fs(src, e)),
    }
}

/// Fallback when a rename cannot cross filesystems. Links are recreated with
/// the same target text rather than copied through.
fn copy_then_remove(src: &Path, dest: &Path, kind: EntryKind) -> Result<()> {
    match kind {
        EntryKind::File => {
            if let Err(e) = fs::copy(src, dest) {
                let _ = fs::remove_file(dest);
                return Err(FormulaError::fs(dest, e));
            }
        }
        EntryKind::Symlink => {
            let target = fs::read_link(src).map_err(|e| FormulaError::fs(src, e))?;
            symlink(&target, dest).map_err(|e| FormulaError::fs(dest, e))?;
        }
    }
    fs::remove_file(src).map_err(|e| FormulaError::fs(src, e))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> u32 {
    0o755
}

#[cfg(unix)]
fn create_dir(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .mode(mode | 0o700)
        .create(path)
        .map_err(|e| FormulaError::fs(path, e))
}

#[cfg(not(unix))]
fn create_dir(path: &Path, _mode: u32) -> Result<()> {
    fs::create_dir(path).map_err(|e| FormulaError::fs(path, e))
}

/// Sets exact permission bits, independent of the process umask.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| FormulaError::fs(path, e))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
