//! The store manager: one active backend plus a cached note listing.
//!
//! The cache belongs to whichever store last answered [`StoreManager::list`].
//! Every other operation requires that store to still be the active one;
//! calling them after [`StoreManager::next_store`] without listing again is a
//! programming error and aborts.

use std::{collections::HashSet, sync::Arc};

use log::{debug, info, warn};

use crate::{
    invariant_violation, CreateNoteRequest, CredentialStore, FileStore, MerlionError, Note,
    NoteStore, RemoteStore, Result, SqlStore, StoreKind, UserConfig,
};

const STALE_CACHE: &str = "Storage was changed, but notes weren't refreshed";

/// Routes note operations to the active store and keeps its listing cached.
pub struct StoreManager {
    stores: Vec<Box<dyn NoteStore>>,
    active: usize,
    /// Cached listing; `content` may be absent until `get_full` fills it.
    notes: Vec<Note>,
    /// Index of the store that produced `notes`.
    cache_owner: Option<usize>,
}

impl StoreManager {
    /// Creates a manager over `stores`, the first one active.
    ///
    /// The cache starts empty and unowned, so `list` must be called first.
    pub fn new(stores: Vec<Box<dyn NoteStore>>) -> Result<Self> {
        if stores.is_empty() {
            return Err(MerlionError::ConfigError {
                message: "no store configured".to_string(),
            });
        }
        info!("Store manager started on {}", stores[0].name());
        Ok(Self {
            stores,
            active: 0,
            notes: Vec::new(),
            cache_owner: None,
        })
    }

    pub fn active_name(&self) -> &str {
        self.active_store().name()
    }

    pub fn active_kind(&self) -> StoreKind {
        self.active_store().kind()
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.name()).collect()
    }

    /// The cached listing.
    pub fn notes(&self) -> &[Note] {
        self.check_cache();
        &self.notes
    }

    fn active_store(&self) -> &dyn NoteStore {
        self.stores[self.active].as_ref()
    }

    fn check_cache(&self) {
        if self.cache_owner != Some(self.active) {
            invariant_violation(STALE_CACHE);
        }
    }

    fn cached_index(&self, note_id: &str) -> Option<usize> {
        self.notes.iter().position(|n| n.note_id == note_id)
    }

    /// Lists the active store and takes the result as the new cache.
    pub async fn list(&mut self) -> Result<Vec<Note>> {
        let notes = self.active_store().list().await?;
        debug!(
            "Cached {} notes from {}",
            notes.len(),
            self.active_store().name()
        );
        self.notes = notes.clone();
        self.cache_owner = Some(self.active);
        Ok(notes)
    }

    /// Reads a note with its content and refreshes its cache entry.
    pub async fn get_full(&mut self, note_id: &str) -> Result<Note> {
        self.check_cache();
        let note = self.active_store().get(note_id).await?;
        match self.cached_index(note_id) {
            Some(i) => self.notes[i] = note.clone(),
            None => invariant_violation(&format!("note {} was read but never listed", note_id)),
        }
        Ok(note)
    }

    pub fn search_by_id(&self, note_id: &str) -> Option<&Note> {
        self.check_cache();
        self.notes.iter().find(|n| n.note_id == note_id)
    }

    /// First cached note whose title matches, ignoring case and surrounding
    /// whitespace.
    pub fn search_by_title(&self, title: &str) -> Option<&Note> {
        self.check_cache();
        let wanted = title.trim().to_lowercase();
        self.notes
            .iter()
            .find(|n| n.title.trim().to_lowercase() == wanted)
    }

    /// Every tag used by a cached note, lower-cased, in no particular order.
    pub fn tags(&self) -> Vec<String> {
        self.check_cache();
        let tags: HashSet<String> = self
            .notes
            .iter()
            .flat_map(|n| n.tags.iter().map(|t| t.to_lowercase()))
            .collect();
        tags.into_iter().collect()
    }

    pub async fn create(&mut self, req: &CreateNoteRequest) -> Result<Note> {
        self.check_cache();
        let note = self.active_store().create(req).await?;
        self.notes.push(note.clone());
        Ok(note)
    }

    /// Updates a note the caller found in the cache.
    pub async fn update(&mut self, note_id: &str, req: &CreateNoteRequest) -> Result<Note> {
        self.check_cache();
        let note = self.active_store().update(note_id, req).await?;
        match self.cached_index(note_id) {
            Some(i) => self.notes[i] = note.clone(),
            None => invariant_violation(&format!("updated note {} was never listed", note_id)),
        }
        Ok(note)
    }

    pub async fn delete(&mut self, note_id: &str) -> Result<()> {
        self.check_cache();
        self.active_store().delete(note_id).await?;
        match self.cached_index(note_id) {
            Some(i) => {
                self.notes.remove(i);
            }
            None => invariant_violation(&format!("deleted note {} was never listed", note_id)),
        }
        Ok(())
    }

    /// Makes the next configured store active, wrapping around.
    ///
    /// The cache still belongs to the previous store; call `list` next.
    pub fn next_store(&mut self) {
        self.active = (self.active + 1) % self.stores.len();
        info!("Set active store to {}", self.active_name());
    }

    /// Installs a freshly authenticated remote client.
    ///
    /// An existing remote store is replaced in place; otherwise the client is
    /// appended and becomes active. When the remote store ends up active the
    /// cache is reloaded from it.
    pub async fn replace_remote(&mut self, remote: RemoteStore) -> Result<()> {
        let remote: Box<dyn NoteStore> = Box::new(remote);
        match self
            .stores
            .iter()
            .position(|s| s.kind() == StoreKind::Remote)
        {
            Some(i) => self.stores[i] = remote,
            None => {
                self.stores.push(remote);
                self.active = self.stores.len() - 1;
                info!("Set active store to {}", self.active_name());
            }
        }

        if self.active_kind() == StoreKind::Remote {
            self.list().await?;
        }
        Ok(())
    }
}

/// Opens every store named in `config`, in order, with the remote store last.
///
/// A remote vault is skipped when no credentials have been saved yet.
pub fn load_stores(
    config: &UserConfig,
    credentials: Arc<CredentialStore>,
    base_url: &str,
) -> Result<Vec<Box<dyn NoteStore>>> {
    let mut stores: Vec<Box<dyn NoteStore>> = Vec::new();
    let mut remote = None;

    for vault in &config.vaults {
        let name = Some(vault.name.as_str()).filter(|n| !n.is_empty());
        match vault.provider {
            StoreKind::Sql => {
                let store = SqlStore::open_default()?;
                match name {
                    Some(name) => stores.push(Box::new(store.with_name(name))),
                    None => stores.push(Box::new(store)),
                }
            }
            StoreKind::File => stores.push(Box::new(FileStore::new(&vault.path, name)?)),
            StoreKind::Remote => {
                match RemoteStore::from_credential_store(credentials.clone(), base_url)? {
                    Some(store) => remote = Some(store),
                    None => warn!("Skipping cloud vault: log in to use it"),
                }
            }
        }
    }

    if let Some(remote) = remote {
        stores.push(Box::new(remote));
    }
    debug!("Loaded {} stores from config", stores.len());
    Ok(stores)
}
