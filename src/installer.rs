use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use crate::archive::StagedArchive;
use crate::channel::{ChannelResolver, Release};
use crate::error::{FormulaError, Result};
use crate::fetch::{fetch_archive, Transport};
use crate::formula::Formula;
use crate::global::cache::ArchiveCache;
use crate::merge::{merge_component, Component, MergeReport};
use crate::receipt::{incomplete_versions, installed_versions, Installed, Receipt};
use crate::relink::{relink_binary, BinaryMetadataEditor, Rewrite};
use crate::ui;
use crate::util::is_executable;

/// What a successful installation did.
#[derive(Debug)]
pub struct InstallOutcome {
    pub release: Release,
    pub prefix: PathBuf,
    pub merged: Vec<(String, MergeReport)>,
    pub rewrites: Vec<Rewrite>,
}

/// Drives one installation run: resolve, fetch, verify, unpack, merge,
/// relink, record.
///
/// The transport and binary editor are injected so the whole sequence can run
/// against fakes.
pub struct Installer<T: Transport, E: BinaryMetadataEditor> {
    formula: Formula,
    root: PathBuf,
    cache: ArchiveCache,
    resolver: ChannelResolver<T>,
    editor: E,
    staging_parent: Option<PathBuf>,
}

impl<T: Transport, E: BinaryMetadataEditor> Installer<T, E> {
    pub fn new(formula: Formula, root: PathBuf, cache: ArchiveCache, transport: T, editor: E) -> Self {
        let resolver = ChannelResolver::new(transport, &formula.dist_root, &formula.target);
        Self {
            formula,
            root,
            cache,
            resolver,
            editor,
            staging_parent: None,
        }
    }

    /// Unpack archives under `dir` instead of the system temp directory.
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_parent = Some(dir.into());
        self
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn resolver(&self) -> &ChannelResolver<T> {
        &self.resolver
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Resolves `channel`, or the formula's channel when `None`.
    pub fn resolve(&mut self, channel: Option<&str>) -> Result<Release> {
        let channel = channel.unwrap_or(self.formula.channel.as_str()).to_string();
        self.resolver.resolve(&channel)
    }

    /// Runs the full installation.
    ///
    /// # Errors
    ///
    /// Any failing step aborts the run. Conflicts, a missing binary editor
    /// tool and resolution failures are reported before anything is
    /// downloaded; checksum failures before anything is unpacked. A failure
    /// during the merge leaves the entries already moved in place.
    pub fn install(&mut self, channel: Option<&str>) -> Result<InstallOutcome> {
        self.formula.check_conflicts(&self.root)?;
        if !self.formula.relink.is_empty() {
            self.editor.check_available()?;
        }

        let release = self.resolve(channel)?;
        ui::action(&format!("Installing {} {}", self.formula.name, release.version));

        ui::detail(&format!("fetching {}", release.url));
        let archive = fetch_archive(self.resolver.transport(), &self.cache, &release)?;

        ui::detail("unpacking");
        let staged = match &self.staging_parent {
            Some(parent) => StagedArchive::unpack_in(&archive, parent)?,
            None => StagedArchive::unpack(&archive)?,
        };
        let components = self
            .formula
            .components
            .iter()
            .map(|name| staged.component(name))
            .collect::<Result<Vec<Component>>>()?;

        let prefix = self.formula.prefix(&self.root, &release.version);
        let mut merged = Vec::with_capacity(components.len());
        for component in &components {
            ui::detail(&format!("installing {}", component.name));
            let report = merge_component(component, &prefix)?;
            merged.push((component.name.clone(), report));
        }

        let staging = self.formula.staging_path();
        let mut rewrites = Vec::new();
        for binary in &self.formula.relink {
            let rel = Path::new(binary);
            let target = prefix.join(rel);
            let moved_now = merged.iter().any(|(_, report)| report.installed(rel));
            if !moved_now && target.symlink_metadata().is_ok() {
                debug!("{} was already in place, not relinking", target.display());
                continue;
            }
            rewrites.extend(relink_binary(&self.editor, &target, &staging, &prefix)?);
        }

        Receipt::new(&self.formula.name, &release, &self.formula.components).save(&prefix)?;
        info!(version = %release.version, prefix = %prefix.display(), "installation complete");
        ui::success(&format!("{} {} installed to {}", self.formula.name, release.version, prefix.display()));

        Ok(InstallOutcome { release, prefix, merged, rewrites })
    }
}

/// Finds an installed version: the given one, or the newest.
pub fn find_installed(formula: &Formula, root: &Path, version: Option<&str>) -> Result<Installed> {
    let mut installed = installed_versions(&formula.install_dir(root))?;
    let found = match version {
        Some(version) => installed
            .into_iter()
            .find(|i| i.receipt.version == version),
        None => installed.pop(),
    };
    found.ok_or_else(|| match version {
        Some(version) => FormulaError::NotInstalled(format!("{} {version}", formula.name)),
        None => FormulaError::NotInstalled(formula.name.clone()),
    })
}

/// Runs each of the formula's smoke tests against `prefix`; every binary must
/// start and exit zero.
pub fn run_smoke_tests(formula: &Formula, prefix: &Path) -> Result<()> {
    for test in &formula.smoke_tests {
        let binary = prefix.join(&test.binary);
        if !is_executable(&binary) {
            return Err(FormulaError::SmokeTest(format!(
                "{} is not an executable file",
                binary.display()
            )));
        }
        debug!("running {} {:?}", binary.display(), test.args);
        let output = Command::new(&binary)
            .args(&test.args)
            .output()
            .map_err(|e| FormulaError::SmokeTest(format!("{}: {e}", binary.display())))?;
        if !output.status.success() {
            return Err(FormulaError::SmokeTest(format!(
                "{} exited with {}: {}",
                binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        ui::detail(&format!("{} ok", test.binary));
    }
    Ok(())
}

/// Removes one installed version, or all of them when `version` is `None`.
/// Prefixes left without a receipt by a failed run are removed too.
/// Returns the versions removed.
pub fn uninstall(formula: &Formula, root: &Path, version: Option<&str>) -> Result<Vec<String>> {
    let install_dir = formula.install_dir(root);
    let targets = match version {
        Some(version) => match find_installed(formula, root, Some(version)) {
            Ok(installed) => vec![(installed.prefix, installed.receipt.version)],
            Err(FormulaError::NotInstalled(missing)) => {
                let prefix = formula.prefix(root, version);
                if !incomplete_versions(&install_dir)?.contains(&prefix) {
                    return Err(FormulaError::NotInstalled(missing));
                }
                vec![(prefix, version.to_string())]
            }
            Err(e) => return Err(e),
        },
        None => {
            let mut targets: Vec<_> = installed_versions(&install_dir)?
                .into_iter()
                .map(|i| (i.prefix, i.receipt.version))
                .collect();
            for prefix in incomplete_versions(&install_dir)? {
                let version = prefix
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                targets.push((prefix, version));
            }
            targets
        }
    };
    let mut removed = Vec::with_capacity(targets.len());
    for (prefix, version) in targets {
        std::fs::remove_dir_all(&prefix).map_err(|e| FormulaError::fs(&prefix, e))?;
        info!("removed {}", prefix.display());
        removed.push(version);
    }

    if let Ok(mut entries) = std::fs::read_dir(&install_dir) {
        if entries.next().is_none() {
            std::fs::remove_dir(&install_dir).map_err(|e| FormulaError::fs(&install_dir, e))?;
        }
    }
    Ok(removed)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::formula::SmokeTest;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn script(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn formula() -> Formula {
        Formula {
            smoke_tests: vec![
                SmokeTest { binary: "bin/rustc".to_string(), args: vec![] },
                SmokeTest { binary: "bin/rustdoc".to_string(), args: vec!["-h".to_string()] },
            ],
            ..Formula::default()
        }
    }

    #[test]
    fn smoke_tests_pass_when_binaries_exit_zero() {
        let dir = tempdir().unwrap();
        script(&dir.path().join("bin/rustc"), "exit 0");
        script(&dir.path().join("bin/rustdoc"), "[ \"$1\" = \"-h\" ]");
        run_smoke_tests(&formula(), dir.path()).unwrap();
    }

    #[test]
    fn smoke_test_failure_is_reported() {
        let dir = tempdir().unwrap();
        script(&dir.path().join("bin/rustc"), "exit 0");
        script(&dir.path().join("bin/rustdoc"), "echo broken >&2; exit 3");
        let err = run_smoke_tests(&formula(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn missing_binary_fails_smoke_test() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            run_smoke_tests(&formula(), dir.path()),
            Err(FormulaError::SmokeTest(_))
        ));
    }

    #[test]
    fn uninstall_specific_and_all() {
        let root = tempdir().unwrap();
        let formula = formula();
        for version in ["1.0.0-beta.1", "1.0.0-beta.2"] {
            let prefix = formula.prefix(root.path(), version);
            std::fs::create_dir_all(prefix.join("bin")).unwrap();
            let release = Release {
                channel: "beta".to_string(),
                version: version.to_string(),
                url: String::new(),
                sha256: String::new(),
            };
            Receipt::new(&formula.name, &release, &formula.components).save(&prefix).unwrap();
        }

        assert_eq!(
            find_installed(&formula, root.path(), None).unwrap().receipt.version,
            "1.0.0-beta.2"
        );
        assert!(matches!(
            uninstall(&formula, root.path(), Some("0.9.0")),
            Err(FormulaError::NotInstalled(_))
        ));
        assert_eq!(uninstall(&formula, root.path(), Some("1.0.0-beta.2")).unwrap(), vec!["1.0.0-beta.2"]);
        assert_eq!(uninstall(&formula, root.path(), None).unwrap(), vec!["1.0.0-beta.1"]);
        assert!(!formula.install_dir(root.path()).exists());
    }

    #[test]
    fn uninstall_removes_prefix_without_receipt() {
        let root = tempdir().unwrap();
        let formula = formula();
        let partial = formula.prefix(root.path(), "1.0.0-beta.3");
        script(&partial.join("bin/rustc"), "exit 0");

        assert!(matches!(
            find_installed(&formula, root.path(), Some("1.0.0-beta.3")),
            Err(FormulaError::NotInstalled(_))
        ));
        assert!(matches!(
            uninstall(&formula, root.path(), Some("..")),
            Err(FormulaError::NotInstalled(_))
        ));
        assert_eq!(uninstall(&formula, root.path(), Some("1.0.0-beta.3")).unwrap(), vec!["1.0.0-beta.3"]);
        assert!(!partial.exists());

        script(&partial.join("bin/rustc"), "exit 0");
        assert_eq!(uninstall(&formula, root.path(), None).unwrap(), vec!["1.0.0-beta.3"]);
        assert!(!formula.install_dir(root.path()).exists());
    }
}
