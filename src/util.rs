use std::cmp::Ordering;
use std::path::Path;
use semver::Version;

/// Returns the current target triple (e.g. `x86_64-unknown-linux-gnu`)
/// based on the host system's architecture and operating system.
pub fn current_target_triple() -> String {
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;

    match (arch, os) {
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("x86_64", "freebsd") => "x86_64-unknown-freebsd".to_string(),
        _ => format!("{}-unknown-{}", arch, os),
    }
}

/// Strips the `sha256:` prefix from a hash if present and lowercases it,
/// so hashes compare uniformly.
pub fn format_hash(hash: &str) -> String {
    hash.trim()
        .strip_prefix("sha256:")
        .unwrap_or(hash.trim())
        .to_ascii_lowercase()
}

/// Orders version strings by semver, falling back to plain string order for
/// anything that does not parse. Parsable versions sort before the rest.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Last path segment of a URL, without any query string.
pub fn url_filename(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or("download")
        .split('?')
        .next()
        .unwrap_or("download")
        .to_string()
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hash_removes_prefix() {
        assert_eq!(format_hash("sha256:ABCDEF123456"), "abcdef123456");
    }

    #[test]
    fn test_format_hash_without_prefix() {
        assert_eq!(format_hash(" abcdef123456\n"), "abcdef123456");
    }

    #[test]
    fn test_compare_versions_orders_prereleases() {
        let mut sorted = vec!["1.2.0", "1.0.0-beta.2", "nightly", "1.0.0-beta.10", "1.0.0"];
        sorted.sort_by(|a, b| compare_versions(a, b));
        assert_eq!(
            sorted,
            vec!["1.0.0-beta.2", "1.0.0-beta.10", "1.0.0", "1.2.0", "nightly"]
        );
    }

    #[test]
    fn test_url_filename() {
        assert_eq!(
            url_filename("https://example.com/dist/rust-1.0.0-x.tar.gz?x=1"),
            "rust-1.0.0-x.tar.gz"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "#!/bin/sh\n").unwrap();
        assert!(!is_executable(&file));
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&file));
    }
}
