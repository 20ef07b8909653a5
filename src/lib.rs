//! Merlion note storage library
//!
//! Notes live in one of three interchangeable backends: an embedded SQLite
//! database, a directory of markdown files, or the hosted note service. The
//! [`StoreManager`] puts one of them in front of the caller and keeps a cached
//! listing of its notes; [`export_notes`] copies everything from one backend
//! into another.

use log::info;

mod cli;
mod config;
mod credentials;
mod errors;
mod export;
mod helper;
mod note;
mod storage;
pub mod stores;
mod types;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use credentials::*;
pub use errors::*;
pub use export::*;
pub use helper::*;
pub use note::*;
pub use storage::*;
pub use stores::{
    FileStore, NoteStore, PermanentDelete, RemoteStore, SqlStore, SystemTrash, Trash,
    DEFAULT_BASE_URL, ENV_DB_PATH, FILE_STORE_NAME, NO_CONTENT, REMOTE_STORE_NAME,
    SQL_STORE_NAME,
};
pub use types::*;

/// Sets up `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
pub fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}
