//! Note backends and the interface they share.
//!
//! Every backend implements [`NoteStore`]. The manager only ever talks to
//! `dyn NoteStore`; backend-specific operations (such as swapping the remote
//! client after a login) are exposed on the manager and keyed on
//! [`NoteStore::kind`] instead of downcasting.

use async_trait::async_trait;

use crate::{CreateNoteRequest, Note, Result, StoreKind};

pub mod file;
pub mod frontmatter;
pub mod migrations;
pub mod remote;
pub mod sql;
pub mod trash;

pub use file::{FileStore, FILE_STORE_NAME};
pub use migrations::{Migration, EMBEDDED_MIGRATIONS};
pub use remote::{RemoteStore, DEFAULT_BASE_URL, NO_CONTENT, REMOTE_STORE_NAME};
pub use sql::{SqlStore, ENV_DB_PATH, SQL_STORE_NAME};
pub use trash::{PermanentDelete, SystemTrash, Trash};

/// Uniform capability exposed by every note backend.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Display name, stable for the lifetime of the instance.
    fn name(&self) -> &str;

    fn kind(&self) -> StoreKind;

    /// All live notes, in no particular order. `content` may be `None`.
    async fn list(&self) -> Result<Vec<Note>>;

    /// A single note with its content resolved.
    async fn get(&self, note_id: &str) -> Result<Note>;

    async fn create(&self, req: &CreateNoteRequest) -> Result<Note>;

    async fn update(&self, note_id: &str, req: &CreateNoteRequest) -> Result<Note>;

    /// Removes a note. Deleting a missing note is `NotFound`, not a no-op.
    async fn delete(&self, note_id: &str) -> Result<()>;
}
