use std::collections::HashMap;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};
use crate::error::{FormulaError, Result};
use crate::fetch::Transport;

/// A fully resolved release, ready to be downloaded and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Channel the release was resolved from (e.g. `beta`).
    pub channel: String,
    /// Version token as it appears in the archive name, e.g. `1.0.0-beta.2`.
    pub version: String,
    /// Download URL of the toolchain archive.
    pub url: String,
    /// Expected SHA-256 of the archive, hex encoded.
    pub sha256: String,
}

/// Resolves channels to their latest release.
///
/// One resolver is built per run. Each channel is looked up at most once; later
/// calls are answered from the memo without touching the network.
pub struct ChannelResolver<T: Transport> {
    transport: T,
    dist_root: String,
    target: String,
    resolved: HashMap<String, Release>,
}

impl<T: Transport> ChannelResolver<T> {
    pub fn new(transport: T, dist_root: &str, target: &str) -> Self {
        Self {
            transport,
            dist_root: dist_root.trim_end_matches('/').to_string(),
            target: target.to_string(),
            resolved: HashMap::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// URL of the listing naming the current archive of `channel`.
    pub fn manifest_url(&self, channel: &str) -> String {
        format!("{}/channel-rust-{}", self.dist_root, channel)
    }

    /// URL of the toolchain archive for `version`.
    pub fn archive_url(&self, version: &str) -> String {
        format!("{}/rust-{}-{}.tar.gz", self.dist_root, version, self.target)
    }

    /// Resolves `channel` to a version, archive URL and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Resolution`] if the listing does not name an
    /// archive for this target, in which case the checksum is never fetched.
    /// Transport failures surface as [`FormulaError::Download`].
    pub fn resolve(&mut self, channel: &str) -> Result<Release> {
        if let Some(release) = self.resolved.get(channel) {
            trace!("channel {channel} already resolved to {}", release.version);
            return Ok(release.clone());
        }

        let manifest = self.transport.get_text(&self.manifest_url(channel))?;
        let version = extract_version(&manifest, &self.target)?;
        let url = self.archive_url(&version);
        let sha256 = self.fetch_checksum(&url)?;
        debug!(%channel, %version, %sha256, "resolved release");

        let release = Release {
            channel: channel.to_string(),
            version,
            url,
            sha256,
        };
        self.resolved.insert(channel.to_string(), release.clone());
        Ok(release)
    }

    fn fetch_checksum(&self, archive_url: &str) -> Result<String> {
        let url = format!("{archive_url}.sha256");
        let body = self.transport.get_text(&url)?;
        body.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| FormulaError::Resolution(format!("checksum file {url} is empty")))
    }
}

/// Pulls the version token out of a channel listing.
///
/// The listing names archives as `rust-<version>-<target>.tar.gz`. Versions
/// start with a digit, which keeps component archives such as `rust-docs-…`
/// from matching. The first match wins.
pub fn extract_version(manifest: &str, target: &str) -> Result<String> {
    let pattern = format!(
        r"rust-(?P<vsn>[0-9][^\s/]*)-{}\.tar\.gz",
        regex::escape(target)
    );
    let re = Regex::new(&pattern).map_err(|e| FormulaError::Resolution(e.to_string()))?;
    re.captures(manifest)
        .map(|caps| caps["vsn"].to_string())
        .ok_or_else(|| {
            FormulaError::Resolution("version pattern not found in channel manifest".to_string())
        })
}
