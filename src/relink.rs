//! Rewriting build-time library references embedded in installed binaries.
//!
//! Toolchain binaries are linked inside the build tree, so their library
//! references point at `<target>/stage1/lib/rustlib/<target>`. Once the
//! binaries sit in their final prefix those references are patched to point
//! there instead.

use std::path::Path;
use std::process::Command;
use tracing::{debug, info};
use crate::error::{FormulaError, Result};

/// Reads and edits the library references embedded in a binary.
pub trait BinaryMetadataEditor {
    /// Library references of `binary`, in the order the tool reports them.
    fn list_references(&self, binary: &Path) -> Result<Vec<String>>;

    /// Replaces reference `old` with `new`, editing `binary` in place.
    fn rewrite_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()>;

    /// Fails if the external tools this editor drives are not on `PATH`.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }
}

/// One reference that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub old: String,
    pub new: String,
}

/// Rewrites every reference of `binary` containing `staging` so that the
/// staging path is replaced by `prefix`. Other references are left alone.
///
/// # Errors
///
/// Returns [`FormulaError::Filesystem`] if the binary does not exist and
/// [`FormulaError::Rewrite`] if the editor fails.
pub fn relink_binary<E: BinaryMetadataEditor + ?Sized>(
    editor: &E,
    binary: &Path,
    staging: &str,
    prefix: &Path,
) -> Result<Vec<Rewrite>> {
    std::fs::symlink_metadata(binary).map_err(|e| FormulaError::fs(binary, e))?;

    let prefix = prefix.to_string_lossy();
    let mut rewrites = Vec::new();
    for old in editor.list_references(binary)? {
        if !old.contains(staging) {
            continue;
        }
        let new = old.replace(staging, &prefix);
        editor.rewrite_reference(binary, &old, &new)?;
        debug!("{}: {old} -> {new}", binary.display());
        rewrites.push(Rewrite { old, new });
    }
    info!("relinked {} ({} references)", binary.display(), rewrites.len());
    Ok(rewrites)
}

/// Mach-O editing through `otool -L` and `install_name_tool -change`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Otool;

impl BinaryMetadataEditor for Otool {
    fn list_references(&self, binary: &Path) -> Result<Vec<String>> {
        let stdout = run_tool("otool", &["-L"], binary)?;
        Ok(parse_otool_output(&stdout))
    }

    fn rewrite_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()> {
        run_tool("install_name_tool", &["-change", old, new], binary).map(drop)
    }

    fn check_available(&self) -> Result<()> {
        require_tools(&["otool", "install_name_tool"])
    }
}

/// `otool -L` prints the binary's own path first, then one dependency per
/// line followed by a `(compatibility version …)` annotation.
pub fn parse_otool_output(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(|line| {
            line.split(" (compatibility version")
                .next()
                .unwrap_or(line)
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// ELF editing through `patchelf`; the references are the RPATH entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct Patchelf;

impl BinaryMetadataEditor for Patchelf {
    fn list_references(&self, binary: &Path) -> Result<Vec<String>> {
        let stdout = run_tool("patchelf", &["--print-rpath"], binary)?;
        Ok(split_rpath(&stdout))
    }

    fn rewrite_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()> {
        let rpath = self
            .list_references(binary)?
            .into_iter()
            .map(|entry| if entry == old { new.to_string() } else { entry })
            .collect::<Vec<_>>()
            .join(":");
        run_tool("patchelf", &["--set-rpath", &rpath], binary).map(drop)
    }

    fn check_available(&self) -> Result<()> {
        require_tools(&["patchelf"])
    }
}

fn split_rpath(output: &str) -> Vec<String> {
    output
        .trim()
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(target_os = "macos")]
pub type PlatformEditor = Otool;
#[cfg(not(target_os = "macos"))]
pub type PlatformEditor = Patchelf;

/// The editor matching the host's binary format.
pub fn platform_editor() -> PlatformEditor {
    PlatformEditor::default()
}

fn require_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        let path = which::which(tool)
            .map_err(|_| FormulaError::rewrite(*tool, "not found in PATH"))?;
        debug!("using {}", path.display());
    }
    Ok(())
}

/// Runs `tool args... binary` and returns its stdout. Spawn failures and
/// non-zero exits are both errors.
fn run_tool(tool: &str, args: &[&str], binary: &Path) -> Result<String> {
    let output = match Command::new(tool).args(args).arg(binary).output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FormulaError::rewrite(binary, format!("'{tool}' not found in PATH")));
        }
        Err(e) => return Err(FormulaError::rewrite(binary, format!("failed to spawn {tool}: {e}"))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FormulaError::rewrite(
            binary,
            format!("{tool} exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
