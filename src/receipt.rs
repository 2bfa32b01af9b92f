use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use crate::channel::Release;
use crate::error::{FormulaError, Result};
use crate::util::compare_versions;

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.toml";

/// Record of a completed installation, stored inside its prefix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub name: String,
    pub channel: String,
    pub version: String,
    pub url: String,
    pub sha256: String,
    pub components: Vec<String>,
    /// Seconds since the Unix epoch.
    pub installed_at: u64,
}

/// A receipt together with the prefix it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub prefix: PathBuf,
    pub receipt: Receipt,
}

impl Receipt {
    pub fn new(name: &str, release: &Release, components: &[String]) -> Self {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            channel: release.channel.clone(),
            version: release.version.clone(),
            url: release.url.clone(),
            sha256: release.sha256.clone(),
            components: components.to_vec(),
            installed_at,
        }
    }

    pub fn load(prefix: &Path) -> Result<Self> {
        let path = prefix.join(RECEIPT_FILE);
        let content = fs::read_to_string(&path).map_err(|e| FormulaError::fs(&path, e))?;
        toml::from_str(&content)
            .map_err(|e| FormulaError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, prefix: &Path) -> Result<()> {
        let path = prefix.join(RECEIPT_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| FormulaError::Config(e.to_string()))?;
        fs::write(&path, content).map_err(|e| FormulaError::fs(&path, e))
    }
}

/// Every version under `install_dir` carrying a readable receipt, oldest
/// version first. Prefixes without a receipt (interrupted installs) are ignored.
pub fn installed_versions(install_dir: &Path) -> Result<Vec<Installed>> {
    if !install_dir.is_dir() {
        return Ok(vec![]);
    }
    let mut installed = Vec::new();
    let entries = fs::read_dir(install_dir).map_err(|e| FormulaError::fs(install_dir, e))?;
    for entry in entries {
        let prefix = entry.map_err(|e| FormulaError::fs(install_dir, e))?.path();
        if !prefix.join(RECEIPT_FILE).is_file() {
            continue;
        }
        let receipt = Receipt::load(&prefix)?;
        installed.push(Installed { prefix, receipt });
    }
    installed.sort_by(|a, b| compare_versions(&a.receipt.version, &b.receipt.version));
    Ok(installed)
}

/// Version directories under `install_dir` with no receipt, left behind by a
/// run that failed after the merge started.
pub fn incomplete_versions(install_dir: &Path) -> Result<Vec<PathBuf>> {
    if !install_dir.is_dir() {
        return Ok(vec![]);
    }
    let mut incomplete = Vec::new();
    for entry in fs::read_dir(install_dir).map_err(|e| FormulaError::fs(install_dir, e))? {
        let prefix = entry.map_err(|e| FormulaError::fs(install_dir, e))?.path();
        if prefix.is_dir() && !prefix.join(RECEIPT_FILE).is_file() {
            incomplete.push(prefix);
        }
    }
    incomplete.sort();
    Ok(incomplete)
}
