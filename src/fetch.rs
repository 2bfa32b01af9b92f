//! Network access and archive integrity.

use std::fs::File;
use std::path::PathBuf;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use crate::channel::Release;
use crate::error::{FormulaError, Result};
use crate::global::cache::ArchiveCache;
use crate::util::format_hash;

/// Where remote documents come from.
///
/// The installer only ever needs plain GETs, so tests can stand in a fake
/// that serves canned bodies and records what was asked for.
pub trait Transport {
    fn get_text(&self, url: &str) -> Result<String>;
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rust-beta/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FormulaError::download("<client>", e))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!("GET {url}");
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| FormulaError::download(url, e))
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)?.text().map_err(|e| FormulaError::download(url, e))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.get(url)?.bytes().map_err(|e| FormulaError::download(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of a file, streamed from disk.
pub fn sha256_file(path: &std::path::Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| FormulaError::fs(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| FormulaError::fs(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compares an actual digest with the expected one.
pub fn verify_checksum(actual: &str, expected: &str) -> Result<()> {
    let expected = format_hash(expected);
    let actual = format_hash(actual);
    if actual != expected {
        return Err(FormulaError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Returns a verified local copy of the release archive.
///
/// A cached archive is reused only if it still matches the release checksum;
/// otherwise it is discarded and downloaded again. Fresh downloads are
/// verified before they reach the cache, so nothing unverified is ever
/// extracted.
pub fn fetch_archive(
    transport: &dyn Transport,
    cache: &ArchiveCache,
    release: &Release,
) -> Result<PathBuf> {
    if let Some(path) = cache.get_cached_archive(&release.url) {
        let actual = sha256_file(&path)?;
        if verify_checksum(&actual, &release.sha256).is_ok() {
            info!("using cached archive {}", path.display());
            return Ok(path);
        }
        debug!("cached archive {} is stale, downloading again", path.display());
        cache.remove_cached_archive(&release.url)?;
    }

    let bytes = transport.get_bytes(&release.url)?;
    verify_checksum(&sha256_hex(&bytes), &release.sha256)?;
    info!("downloaded {} ({} bytes)", release.url, bytes.len());
    cache.cache_archive(&release.url, &bytes)
}
