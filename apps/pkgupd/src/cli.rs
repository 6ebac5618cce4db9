//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pkgupd - Package update daemon
#[derive(Parser)]
#[command(name = "pkgupd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve, fetch and activate package updates")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the logs directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data root (overrides config and PKGUP_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch and admit the newest version of a package
    #[command(alias = "up")]
    Update {
        /// Package name
        name: String,

        /// Pin a specific version
        #[arg(long)]
        version: Option<String>,

        /// Merkle root currently installed
        #[arg(long)]
        merkle: Option<String>,

        /// Wait until every blob is present and the package is activated
        #[arg(long)]
        wait: bool,
    },

    /// List activated packages
    #[command(alias = "ls")]
    List,

    /// List registered sources
    Sources,

    /// Register a directory-backed source
    AddSource {
        /// file:// URL or absolute path
        url: String,

        /// Checks allowed per check interval (0 = configured default)
        #[arg(long, default_value_t = 0)]
        rate_limit: u64,

        /// Public key recorded with the source
        #[arg(long)]
        pub_key: Option<String>,
    },

    /// Remove a registered source
    RemoveSource {
        /// URL the source was registered with
        url: String,
    },

    /// Check installed packages for updates
    Check,

    /// Fetch a single blob into the store
    GetBlob {
        /// Blob merkle root
        merkle: String,
    },
}
