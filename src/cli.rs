use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Directory holding installed formulas (`<root>/<name>/<version>`)
    #[clap(long, global = true, env = "RUST_BETA_ROOT")]
    pub(crate) root: Option<PathBuf>,
    /// Directory for downloaded archives
    #[clap(long, global = true, env = "RUST_BETA_CACHE_DIR")]
    pub(crate) cache_dir: Option<PathBuf>,
    /// TOML file overriding fields of the built-in formula
    #[clap(long, global = true)]
    pub(crate) formula: Option<PathBuf>,
    /// Log each step (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: FormulaCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum FormulaCommand {
    /// Resolves the latest release, verifies it and merges it into the prefix
    Install {
        /// Channel to install from. Defaults to the formula's channel
        #[clap(long)]
        channel: Option<String>,
    },
    /// Runs the installed compiler and documentation generator
    Test {
        /// Installed version to test. Defaults to the newest
        #[clap(long)]
        version: Option<String>,
    },
    /// Shows the formula and the release its channel currently resolves to
    Info {
        #[clap(long)]
        channel: Option<String>,
        /// Print as JSON
        #[clap(long)]
        json: bool,
    },
    /// Lists installed versions
    List,
    /// Removes installed versions. Defaults to all
    Uninstall {
        /// Remove one specific version
        #[clap(long)]
        version: Option<String>,
    },
    /// Empties the download cache
    Clean,
}
