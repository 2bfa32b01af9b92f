use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{FormulaError, Result};
use crate::util::current_target_triple;

/// The declarative recipe driving an installation.
///
/// The defaults describe the beta toolchain. A `formula.toml` may override any
/// subset of the fields; missing fields keep their defaults.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Formula {
    /// Package name, also the directory under the installation root.
    pub name: String,
    pub homepage: String,
    /// Upstream repository. Informational only, never built from.
    pub head: String,
    /// Release channel to track (e.g. `"beta"`).
    pub channel: String,
    /// Base URL holding the channel listings and release archives.
    pub dist_root: String,
    /// Target triple embedded in archive names.
    pub target: String,
    /// Components merged into the prefix, in order. Earlier components win
    /// on colliding paths.
    pub components: Vec<String>,
    /// Binaries, relative to the prefix, whose library references are
    /// rewritten after the merge. Binaries the merge found already in place
    /// are left alone.
    pub relink: Vec<String>,
    /// Packages that must not be installed alongside this one.
    pub conflicts: Vec<Conflict>,
    /// Commands run by `test` against an installed prefix.
    pub smoke_tests: Vec<SmokeTest>,
}

/// A package this formula refuses to coexist with.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Conflict {
    pub name: String,
    pub because: String,
}

/// One installed binary invocation that must exit zero.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SmokeTest {
    /// Path relative to the prefix, e.g. `bin/rustc`.
    pub binary: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Formula {
    fn default() -> Self {
        Self {
            name: "rust-beta".to_string(),
            homepage: "http://www.rust-lang.org/".to_string(),
            head: "https://github.com/rust-lang/rust.git".to_string(),
            channel: "beta".to_string(),
            dist_root: "https://static.rust-lang.org/dist".to_string(),
            target: current_target_triple(),
            components: vec![
                "rustc".to_string(),
                "rust-docs".to_string(),
                "cargo".to_string(),
            ],
            relink: vec!["bin/rustc".to_string(), "bin/rustdoc".to_string()],
            conflicts: vec![
                Conflict { name: "rust".to_string(), because: "same".to_string() },
                Conflict { name: "rust-nightly".to_string(), because: "same".to_string() },
            ],
            smoke_tests: vec![
                SmokeTest { binary: "bin/rustc".to_string(), args: vec![] },
                SmokeTest { binary: "bin/rustdoc".to_string(), args: vec!["-h".to_string()] },
            ],
        }
    }
}

impl Formula {
    /// Loads a formula from a TOML file and validates it.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, parsed, or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Formula> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FormulaError::fs(path, e))?;
        let formula: Formula = toml::from_str(&content)
            .map_err(|e| FormulaError::Config(format!("{}: {e}", path.display())))?;
        formula.validate()?;
        debug!(name = %formula.name, channel = %formula.channel, "loaded formula from {}", path.display());
        Ok(formula)
    }

    /// Writes the formula as pretty TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| FormulaError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| FormulaError::fs(path, e))
    }

    /// Rejects formulas that could never install anything sensible.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FormulaError::Config("name must not be empty".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(FormulaError::Config("channel must not be empty".to_string()));
        }
        if self.components.is_empty() {
            return Err(FormulaError::Config("at least one component is required".to_string()));
        }
        for rel in self.relink.iter().chain(self.smoke_tests.iter().map(|t| &t.binary)) {
            if Path::new(rel).is_absolute() {
                return Err(FormulaError::Config(format!(
                    "binary paths must be relative to the prefix: {rel}"
                )));
            }
        }
        Ok(())
    }

    /// The path fragment baked into binaries at build time, replaced by the
    /// prefix during load-path rewriting.
    pub fn staging_path(&self) -> String {
        format!("{0}/stage1/lib/rustlib/{0}", self.target)
    }

    /// Where all versions of this formula live under `root`.
    pub fn install_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// The installation prefix for one version.
    pub fn prefix(&self, root: &Path, version: &str) -> PathBuf {
        self.install_dir(root).join(version)
    }

    /// Fails if any conflicting package has a non-empty directory under `root`.
    ///
    /// This runs before any network request is made.
    pub fn check_conflicts(&self, root: &Path) -> Result<()> {
        for conflict in &self.conflicts {
            let dir = root.join(&conflict.name);
            if !dir.is_dir() {
                continue;
            }
            let mut entries = std::fs::read_dir(&dir)
                .map_err(|e| FormulaError::fs(&dir, e))?;
            if entries.next().is_some() {
                return Err(FormulaError::Conflict {
                    name: conflict.name.clone(),
                    because: conflict.because.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_formula_tracks_beta() {
        let formula = Formula::default();
        assert_eq!(formula.channel, "beta");
        assert_eq!(formula.components, vec!["rustc", "rust-docs", "cargo"]);
        assert!(formula.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("formula.toml");
        std::fs::write(&path, "channel = \"nightly\"\ntarget = \"x86_64-apple-darwin\"\n").unwrap();

        let formula = Formula::load(&path).unwrap();
        assert_eq!(formula.channel, "nightly");
        assert_eq!(formula.name, "rust-beta");
        assert_eq!(
            formula.staging_path(),
            "x86_64-apple-darwin/stage1/lib/rustlib/x86_64-apple-darwin"
        );
    }

    #[test]
    fn absolute_relink_path_is_rejected() {
        let formula = Formula {
            relink: vec!["/usr/bin/rustc".to_string()],
            ..Formula::default()
        };
        assert!(matches!(formula.validate(), Err(FormulaError::Config(_))));
    }

    #[test]
    fn conflicts_only_on_non_empty_install() {
        let root = tempdir().unwrap();
        let formula = Formula::default();

        std::fs::create_dir_all(root.path().join("rust")).unwrap();
        assert!(formula.check_conflicts(root.path()).is_ok());

        std::fs::create_dir_all(root.path().join("rust-nightly").join("1.0.0")).unwrap();
        match formula.check_conflicts(root.path()) {
            Err(FormulaError::Conflict { name, .. }) => assert_eq!(name, "rust-nightly"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn save_and_load_preserve_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("formula.toml");
        let formula = Formula { channel: "stable".to_string(), ..Formula::default() };
        formula.save(&path).unwrap();
        assert_eq!(Formula::load(&path).unwrap(), formula);
    }
}
