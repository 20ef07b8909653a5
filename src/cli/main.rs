use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{StoreKind, DEFAULT_BASE_URL};

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "merlion",
    version,
    about = "Notes in SQLite, markdown vaults or the cloud"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Address of the note service
    #[clap(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the merlion application
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the notes of a configured vault
    List {
        /// Position among the opened vaults, cloud last (default: the first)
        #[clap(short = 'V', long)]
        vault: Option<usize>,

        /// Only notes carrying this tag
        #[clap(short, long)]
        tag: Option<String>,

        /// Output format
        #[clap(short, long, value_parser = ["text", "json"], default_value = "text")]
        format: String,
    },

    /// Print one note with its content
    Show {
        /// Note ID
        id: String,

        /// Position among the opened vaults, cloud last (default: the first)
        #[clap(short = 'V', long)]
        vault: Option<usize>,

        /// Print the note as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Copy every note from one backend into another
    Export {
        /// Backend to read from: sql, file or remote
        #[clap(long)]
        from: StoreKind,

        /// Vault directory (file) or database file (sql) to read from
        #[clap(long)]
        from_path: Option<String>,

        /// Backend to write to: sql, file or remote
        #[clap(long)]
        to: StoreKind,

        /// Vault directory (file) or database file (sql) to write to
        #[clap(long)]
        to_path: Option<String>,
    },

    /// Add a vault to the config; `remote` logs in and saves the credentials
    Vault {
        /// Backend to add: sql, file or remote
        provider: StoreKind,

        /// Vault directory (file only)
        path: Option<String>,

        /// Display name (default: the backend's name, or the directory)
        #[clap(short, long)]
        name: Option<String>,

        /// Cloud account email, prompted for when missing
        #[clap(short, long)]
        email: Option<String>,
    },

    /// Forget the saved cloud credentials
    Logout,

    /// Show the configured vaults
    Vaults,
}
