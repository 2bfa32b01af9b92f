//! # rust-beta
//!
//! A formula for installing the latest beta Rust toolchain into a
//! self-contained prefix, without touching anything already installed there.
//!
//! The run is strictly sequential: the channel listing is scraped for the
//! current version, the archive is fetched and checked against its published
//! SHA-256, unpacked, and each component is merged into
//! `<root>/<name>/<version>`. Finally the compiler binaries have their
//! build-time library references rewritten to the prefix.
//!
//! ## Modules Overview
//! - [`formula`] – The recipe: channel, target, components, conflicts
//! - [`channel`] – Resolving a channel to version, URL and checksum
//! - [`fetch`] – Transport seam, downloads and checksum verification
//! - [`archive`] – Unpacking release archives into a staging directory
//! - [`merge`] – Merging components into the prefix, first writer wins
//! - [`relink`] – Rewriting library references embedded in binaries
//! - [`receipt`] – Records of completed installations
//! - [`installer`] – The end-to-end run, smoke tests and uninstall
//! - [`global`] – Per-user directories and the archive cache

pub mod archive;
pub mod channel;
pub mod error;
pub mod fetch;
pub mod formula;
pub mod global;
pub mod installer;
pub mod merge;
pub mod receipt;
pub mod relink;
pub mod ui;
pub mod util;

pub use channel::*;
pub use error::{FormulaError, Result};
pub use fetch::{HttpTransport, Transport};
pub use formula::*;
pub use global::cache::ArchiveCache;
pub use installer::*;
pub use merge::*;
pub use receipt::*;
pub use relink::*;
