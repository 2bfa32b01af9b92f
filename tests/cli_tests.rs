use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn cli(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rust-beta").unwrap();
    cmd.arg("--root")
        .arg(root.join("Cellar"))
        .arg("--cache-dir")
        .arg(root.join("cache"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let output = Command::cargo_bin("rust-beta").unwrap()
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let output_str = String::from_utf8_lossy(&output);
    for command in ["install", "test", "info", "list", "uninstall", "clean"] {
        assert!(output_str.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_install_refuses_conflicting_package() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Cellar").join("rust").join("1.0.0")).unwrap();

    let output = cli(dir.path())
        .arg("install")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("rust is already installed"), "{stderr}");
    assert!(!dir.path().join("cache").exists());
}

#[test]
fn test_list_and_uninstall_with_nothing_installed() {
    let dir = tempdir().unwrap();

    let output = cli(dir.path())
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("Nothing installed"));

    cli(dir.path())
        .arg("uninstall")
        .assert()
        .success();
}

#[test]
fn test_test_requires_an_installation() {
    let dir = tempdir().unwrap();
    let output = cli(dir.path())
        .arg("test")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("rust-beta is not installed"));
}

#[test]
fn test_clean_empty_cache() {
    let dir = tempdir().unwrap();
    let output = cli(dir.path())
        .arg("clean")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("Removed 0 cached archive(s)"));
}

#[test]
fn test_invalid_formula_file_is_rejected() {
    let dir = tempdir().unwrap();
    let formula = dir.path().join("formula.toml");
    fs::write(&formula, "components = []\n").unwrap();

    let output = cli(dir.path())
        .arg("--formula")
        .arg(&formula)
        .arg("list")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("at least one component is required"));
}

#[cfg(unix)]
#[cfg(test)]
mod installed_prefix_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use rust_beta::{Formula, Receipt, Release};

    fn fake_install(root: &Path, version: &str, rustdoc_exit: i32) {
        let formula = Formula::default();
        let prefix = formula.prefix(&root.join("Cellar"), version);
        let bin = prefix.join("bin");
        fs::create_dir_all(&bin).unwrap();
        for (name, body) in [
            ("rustc", "exit 0".to_string()),
            ("rustdoc", format!("[ \"$1\" = \"-h\" ] || exit 9\nexit {rustdoc_exit}")),
        ] {
            let path = bin.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let release = Release {
            channel: "beta".to_string(),
            version: version.to_string(),
            url: format!("https://static.rust-lang.org/dist/rust-{version}.tar.gz"),
            sha256: "abc".to_string(),
        };
        Receipt::new(&formula.name, &release, &formula.components)
            .save(&prefix)
            .unwrap();
    }

    #[test]
    fn test_smoke_tests_run_against_newest_install() {
        let dir = tempdir().unwrap();
        fake_install(dir.path(), "1.0.0-beta.1", 1);
        fake_install(dir.path(), "1.0.0-beta.2", 0);

        cli(dir.path())
            .arg("test")
            .assert()
            .success();

        cli(dir.path())
            .args(["test", "--version", "1.0.0-beta.1"])
            .assert()
            .failure();
    }

    #[test]
    fn test_list_then_uninstall_one_version() {
        let dir = tempdir().unwrap();
        fake_install(dir.path(), "1.0.0-beta.1", 0);
        fake_install(dir.path(), "1.0.0-beta.2", 0);

        let output = cli(dir.path())
            .arg("list")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let output_str = String::from_utf8_lossy(&output);
        assert!(output_str.contains("rust-beta 1.0.0-beta.1"));
        assert!(output_str.contains("rust-beta 1.0.0-beta.2"));

        cli(dir.path())
            .args(["uninstall", "--version", "1.0.0-beta.1"])
            .assert()
            .success();
        assert!(!dir.path().join("Cellar/rust-beta/1.0.0-beta.1").exists());
        assert!(dir.path().join("Cellar/rust-beta/1.0.0-beta.2").exists());
    }

    #[test]
    fn test_list_warns_about_and_uninstall_removes_incomplete_install() {
        let dir = tempdir().unwrap();
        fake_install(dir.path(), "1.0.0-beta.1", 0);
        let partial = dir.path().join("Cellar/rust-beta/1.0.0-beta.2");
        fs::create_dir_all(partial.join("bin")).unwrap();

        let output = cli(dir.path())
            .arg("list")
            .assert()
            .success()
            .get_output()
            .clone();
        assert!(String::from_utf8_lossy(&output.stderr).contains("incomplete installation"));
        assert!(!String::from_utf8_lossy(&output.stdout).contains("1.0.0-beta.2"));

        cli(dir.path())
            .arg("uninstall")
            .assert()
            .success();
        assert!(!dir.path().join("Cellar/rust-beta").exists());
    }
}
