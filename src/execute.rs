use std::path::PathBuf;
use anyhow::{Context, Result};
use serde::Serialize;
use rust_beta::formula::Formula;
use rust_beta::global::cache::ArchiveCache;
use rust_beta::global::utils::{get_global_cache_dir, get_global_root_dir};
use rust_beta::installer::{find_installed, run_smoke_tests, uninstall, Installer};
use rust_beta::receipt::{incomplete_versions, installed_versions};
use rust_beta::relink::platform_editor;
use rust_beta::channel::{ChannelResolver, Release};
use rust_beta::fetch::HttpTransport;
use rust_beta::ui;
use crate::cli::{FormulaCommand, CLI};

/// Formula and directories shared by every command.
pub struct Settings {
    formula: Formula,
    root: PathBuf,
    cache: ArchiveCache,
}

impl Settings {
    fn from_cli(cli: &CLI) -> Result<Self> {
        let formula = match &cli.formula {
            Some(path) => Formula::load(path)
                .with_context(|| format!("loading formula {}", path.display()))?,
            None => Formula::default(),
        };
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => get_global_root_dir()?,
        };
        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => get_global_cache_dir()?,
        };
        Ok(Self { formula, root, cache: ArchiveCache::new(cache_dir) })
    }
}

pub fn execute(cli: CLI) -> Result<()> {
    let settings = Settings::from_cli(&cli)?;
    match cli.command {
        FormulaCommand::Install { channel } => {
            execute_install(settings, channel)
        }
        FormulaCommand::Test { version } => {
            execute_test(&settings, version)
        }
        FormulaCommand::Info { channel, json } => {
            execute_info(&settings, channel, json)
        }
        FormulaCommand::List => {
            execute_list(&settings)
        }
        FormulaCommand::Uninstall { version } => {
            execute_uninstall(&settings, version)
        }
        FormulaCommand::Clean => {
            execute_clean(&settings)
        }
    }
}

pub fn execute_install(settings: Settings, channel: Option<String>) -> Result<()> {
    let transport = HttpTransport::new()?;
    let mut installer = Installer::new(
        settings.formula,
        settings.root,
        settings.cache,
        transport,
        platform_editor(),
    );
    installer
        .install(channel.as_deref())
        .context("installation failed")?;
    Ok(())
}

pub fn execute_test(settings: &Settings, version: Option<String>) -> Result<()> {
    let installed = find_installed(&settings.formula, &settings.root, version.as_deref())?;
    ui::action(&format!(
        "Testing {} {}",
        settings.formula.name, installed.receipt.version
    ));
    run_smoke_tests(&settings.formula, &installed.prefix).context("smoke test failed")?;
    ui::success("all smoke tests passed");
    Ok(())
}

#[derive(Serialize)]
struct Info<'a> {
    formula: &'a Formula,
    release: &'a Release,
}

pub fn execute_info(settings: &Settings, channel: Option<String>, json: bool) -> Result<()> {
    let formula = &settings.formula;
    let channel = channel.unwrap_or_else(|| formula.channel.clone());
    let mut resolver = ChannelResolver::new(HttpTransport::new()?, &formula.dist_root, &formula.target);
    let release = resolver
        .resolve(&channel)
        .with_context(|| format!("resolving channel {channel}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&Info { formula, release: &release })?);
        return Ok(());
    }
    println!("{}: {}", formula.name, release.version);
    println!("  homepage: {}", formula.homepage);
    println!("  head: {}", formula.head);
    println!("  channel: {}", release.channel);
    println!("  url: {}", release.url);
    println!("  sha256: {}", release.sha256);
    println!("  components: {}", formula.components.join(", "));
    for conflict in &formula.conflicts {
        println!("  conflicts with: {} (because {})", conflict.name, conflict.because);
    }
    Ok(())
}

pub fn execute_list(settings: &Settings) -> Result<()> {
    let install_dir = settings.formula.install_dir(&settings.root);
    for prefix in incomplete_versions(&install_dir)? {
        ui::warning(&format!("incomplete installation at {} (remove with uninstall)", prefix.display()));
    }
    let installed = installed_versions(&install_dir)?;
    if installed.is_empty() {
        println!("Nothing installed");
        return Ok(());
    }
    for entry in installed {
        println!("{} {}", entry.receipt.name, entry.receipt.version);
        println!("  channel: {}", entry.receipt.channel);
        println!("  prefix: {}", entry.prefix.display());
        println!("  sha256: {}", entry.receipt.sha256);
    }
    Ok(())
}

pub fn execute_uninstall(settings: &Settings, version: Option<String>) -> Result<()> {
    let removed = uninstall(&settings.formula, &settings.root, version.as_deref())?;
    if removed.is_empty() {
        ui::warning("nothing to uninstall");
    }
    for version in removed {
        println!("Uninstalled {} {}", settings.formula.name, version);
    }
    Ok(())
}

pub fn execute_clean(settings: &Settings) -> Result<()> {
    let removed = settings.cache.clean_cache()?;
    println!("Removed {} cached archive(s) from {}", removed, settings.cache.dir().display());
    Ok(())
}
