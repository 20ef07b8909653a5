//! Directory of markdown files, one note per file.
//!
//! The file name (without `.md`) is both the title and the note id; for files
//! in sub-directories the id is the relative path. Metadata lives in the
//! header block described in [`super::frontmatter`]. The layout is the one
//! Obsidian uses, so an existing vault can be pointed at directly.

use std::{
    fs,
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, error, info, trace, warn};
use serde_yaml::Mapping;
use walkdir::WalkDir;

use super::frontmatter::{self, Document};
use super::trash::{SystemTrash, Trash};
use super::NoteStore;
use crate::{
    helper, validate_file_title, CreateNoteRequest, MerlionError, Note, Result, StoreKind,
};

pub const FILE_STORE_NAME: &str = "File System";

const NOTE_EXTENSION: &str = "md";

/// Note store over a directory of `.md` files.
pub struct FileStore {
    root: PathBuf,
    name: String,
    trash: Box<dyn Trash>,
}

impl FileStore {
    /// Opens the vault at `root`, creating the directory if needed.
    ///
    /// `~/` is expanded and relative paths are made absolute. Paths that
    /// climb with `..` are rejected.
    pub fn new(root: &str, name: Option<&str>) -> Result<Self> {
        let root = validate_root(root)?;
        helper::ensure_dir(&root, 0o755)?;
        info!("Opened file vault at {}", root.display());

        Ok(Self {
            root,
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(FILE_STORE_NAME)
                .to_string(),
            trash: Box::new(SystemTrash),
        })
    }

    /// Replaces the recycle mechanism used by `delete`.
    pub fn with_trash(mut self, trash: impl Trash + 'static) -> Self {
        self.trash = Box::new(trash);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finds the file backing `note_id`, accepting any case of the extension.
    fn locate(&self, note_id: &str) -> Result<Option<PathBuf>> {
        let relative = Path::new(note_id);
        if note_id.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(MerlionError::InvalidNote {
                message: format!("'{}' is not a valid note id", note_id),
            });
        }

        let exact = self.root.join(format!("{}.{}", note_id, NOTE_EXTENSION));
        if exact.is_file() {
            return Ok(Some(exact));
        }

        let (Some(parent), Some(stem)) = (exact.parent(), relative.file_name()) else {
            return Ok(None);
        };
        if !parent.is_dir() {
            return Ok(None);
        }
        for entry in fs::read_dir(parent)? {
            let path = entry?.path();
            if path.is_file() && is_note_file(&path) && path.file_stem() == Some(stem) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn note_id_for(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            error!("Error getting relative path for {}", path.display());
            MerlionError::InvalidFormat {
                message: format!("{} is outside of {}", path.display(), self.root.display()),
            }
        })?;
        let without_ext = relative.with_extension("");
        let parts: Vec<String> = without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }

    /// Reads one note file, returning the note and its raw header.
    fn read_note(&self, path: &Path) -> Result<(Note, Mapping)> {
        trace!("Parsing note file: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            error!("Failed to read note file {}: {}", path.display(), e);
            MerlionError::Io(e)
        })?;
        let doc = frontmatter::split(&text).map_err(|e| {
            error!("Error parsing note file {}: {}", path.display(), e);
            e
        })?;
        let (fs_created, fs_modified) = file_times(path)?;

        let note_id = self.note_id_for(path)?;
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| note_id.clone());
        let created_at = file_precision(
            frontmatter::get_time(&doc.header, frontmatter::KEY_CREATED_AT).unwrap_or(fs_created),
        );
        let updated_at = file_precision(
            frontmatter::get_time(&doc.header, frontmatter::KEY_UPDATED_AT).unwrap_or(fs_modified),
        )
        .max(created_at);

        let note = Note {
            note_id,
            title,
            content: Some(doc.body),
            tags: frontmatter::get_tags(&doc.header),
            is_favorite: frontmatter::get_bool(&doc.header, frontmatter::KEY_FAVORITE, false),
            is_work_log: frontmatter::get_bool(&doc.header, frontmatter::KEY_WORKLOG, false),
            is_trash: false,
            created_at,
            updated_at,
        };
        Ok((note, doc.header))
    }

    fn write_note(&self, path: &Path, note: &Note, previous: Option<&Mapping>) -> Result<()> {
        let doc = Document {
            header: frontmatter::header_for(note, previous),
            body: note.content.clone().unwrap_or_default(),
        };
        let text = frontmatter::render(&doc)?;
        helper::atomic_write(path, text.as_bytes(), 0o644).map_err(|e| {
            error!("Failed to write note file {}: {}", path.display(), e);
            e
        })
    }
}

fn validate_root(root: &str) -> Result<PathBuf> {
    let expanded = helper::expand_home(root.trim())?;
    if expanded.as_os_str().is_empty() {
        return Err(MerlionError::ConfigError {
            message: "vault path is empty".to_string(),
        });
    }
    if expanded.components().any(|c| c == Component::ParentDir) {
        return Err(MerlionError::ConfigError {
            message: format!("path contains directory traversal: {}", expanded.display()),
        });
    }

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    // Drop `.` components.
    Ok(absolute.components().collect())
}

fn is_note_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(NOTE_EXTENSION))
}

/// Birth and modification time; birth falls back to modification time on
/// filesystems that do not record it.
fn file_times(path: &Path) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let meta = fs::metadata(path)?;
    let modified: SystemTime = meta.modified()?;
    let created = meta.created().unwrap_or(modified);
    Ok((created.into(), modified.into()))
}

fn file_precision(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

#[async_trait]
impl NoteStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StoreKind {
        StoreKind::File
    }

    async fn list(&self) -> Result<Vec<Note>> {
        debug!("Starting to list notes in {}", self.root.display());
        let mut notes = Vec::new();
        let mut load_errors = 0usize;

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_note_file(path) {
                continue;
            }
            match self.read_note(path) {
                Ok((note, _)) => notes.push(note),
                Err(e) => {
                    warn!("Failed to load note from {}: {}", path.display(), e);
                    load_errors += 1;
                }
            }
        }

        if load_errors > 0 {
            error!("Encountered {} errors while listing notes", load_errors);
        }
        debug!("Finished listing notes, count={}", notes.len());
        Ok(notes)
    }

    async fn get(&self, note_id: &str) -> Result<Note> {
        let Some(path) = self.locate(note_id)? else {
            warn!("Note not found: {}", note_id);
            return Err(MerlionError::NoteNotFound {
                id: note_id.to_string(),
            });
        };
        let (note, _) = self.read_note(&path)?;
        debug!("Successfully retrieved note {}", note_id);
        Ok(note)
    }

    async fn create(&self, req: &CreateNoteRequest) -> Result<Note> {
        validate_file_title(&req.title).map_err(|e| {
            error!("Invalid title with forbidden characters: {}", req.title);
            e
        })?;

        let note_id = req.title.clone();
        let path = self.root.join(format!("{}.{}", note_id, NOTE_EXTENSION));
        if self.locate(&note_id)?.is_some() {
            warn!("Note already exists: {}", note_id);
            return Err(MerlionError::NoteAlreadyExists { id: note_id });
        }

        let (created_at, updated_at) = req.timestamps(Utc::now());
        let note = Note {
            note_id,
            title: req.title.clone(),
            content: Some(req.content.clone().unwrap_or_default()),
            tags: req.tags.clone(),
            is_favorite: req.is_favorite.unwrap_or(false),
            is_work_log: req.is_work_log.unwrap_or(false),
            is_trash: false,
            created_at: file_precision(created_at),
            updated_at: file_precision(updated_at),
        };
        self.write_note(&path, &note, None)?;

        info!("Successfully created note {}", note.note_id);
        Ok(note)
    }

    async fn update(&self, note_id: &str, req: &CreateNoteRequest) -> Result<Note> {
        let Some(path) = self.locate(note_id)? else {
            return Err(MerlionError::NoteNotFound {
                id: note_id.to_string(),
            });
        };
        let (existing, header) = self.read_note(&path)?;

        let target = if req.title == existing.title {
            path.clone()
        } else {
            validate_file_title(&req.title)?;
            let parent = path.parent().unwrap_or(&self.root);
            let target = parent.join(format!("{}.{}", req.title, NOTE_EXTENSION));
            if target.exists() {
                return Err(MerlionError::NoteAlreadyExists {
                    id: self.note_id_for(&target)?,
                });
            }
            target
        };

        let note = Note {
            note_id: self.note_id_for(&target)?,
            title: req.title.clone(),
            content: req.content.clone().or(existing.content),
            tags: req.tags.clone(),
            is_favorite: req.is_favorite.unwrap_or(existing.is_favorite),
            is_work_log: req.is_work_log.unwrap_or(existing.is_work_log),
            is_trash: false,
            created_at: existing.created_at,
            updated_at: file_precision(Utc::now()).max(existing.updated_at),
        };
        self.write_note(&target, &note, Some(&header))?;

        if target != path {
            fs::remove_file(&path)?;
            info!("Renamed note {} to {}", note_id, note.note_id);
        }
        debug!("Updated note {}", note.note_id);
        Ok(note)
    }

    async fn delete(&self, note_id: &str) -> Result<()> {
        let Some(path) = self.locate(note_id)? else {
            warn!("Note not found for deletion: {}", note_id);
            return Err(MerlionError::NoteNotFound {
                id: note_id.to_string(),
            });
        };

        if let Err(e) = self.trash.trash(&path) {
            warn!(
                "Could not move {} to trash ({}), deleting it permanently",
                path.display(),
                e
            );
            fs::remove_file(&path)?;
        }
        info!("Successfully deleted note {}", note_id);
        Ok(())
    }
}
