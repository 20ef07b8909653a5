//! Embedded SQLite note store.
//!
//! One database file, opened in WAL mode with a busy timeout, pinged and
//! migrated on open. Deleted notes are kept with `is_trash = 1` and are
//! invisible to every other operation.

use std::{
    env,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::{debug, error, info, trace};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::migrations::{self, Migration, EMBEDDED_MIGRATIONS};
use super::NoteStore;
use crate::{helper, CreateNoteRequest, MerlionError, Note, Result, StoreKind};

/// Environment variable overriding the database location.
pub const ENV_DB_PATH: &str = "MERLION_DB_PATH";

pub const SQL_STORE_NAME: &str = "Local Storage";

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const NOTE_COLUMNS: &str = "note_id, title, content, tags, is_favorite, is_work_log, \
                            is_trash, created_at, updated_at";

/// Resolves the database path from `MERLION_DB_PATH`, falling back to
/// `<home>/.merlion/notes.db`. The parent directory is created if missing.
pub fn resolve_db_path() -> Result<PathBuf> {
    let path = db_path_from(env::var(ENV_DB_PATH).ok(), dirs::home_dir())?;
    if let Some(parent) = path.parent() {
        helper::ensure_dir(parent, 0o750)?;
    }
    Ok(path)
}

fn db_path_from(env_value: Option<String>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = env_value.filter(|p| !p.trim().is_empty()) {
        info!("Using database path from {}: {}", ENV_DB_PATH, path);
        return Ok(PathBuf::from(path));
    }

    let home = home.ok_or_else(|| MerlionError::ConfigError {
        message: "failed to get user home directory".to_string(),
    })?;
    let path = home.join(".merlion").join("notes.db");
    info!("Using default database path: {}", path.display());
    Ok(path)
}

/// Raw row as stored, before tags and timestamps are decoded.
struct NoteRow {
    note_id: String,
    title: String,
    content: Option<String>,
    tags: Option<String>,
    is_favorite: bool,
    is_work_log: bool,
    is_trash: bool,
    created_at: String,
    updated_at: String,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            note_id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            tags: row.get(3)?,
            is_favorite: row.get(4)?,
            is_work_log: row.get(5)?,
            is_trash: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_note(self, with_content: bool) -> Result<Note> {
        let content = if with_content {
            Some(self.content.unwrap_or_default())
        } else {
            None
        };
        Ok(Note {
            tags: decode_tags(self.tags.as_deref(), &self.note_id)?,
            created_at: decode_time(&self.created_at, &self.note_id)?,
            updated_at: decode_time(&self.updated_at, &self.note_id)?,
            note_id: self.note_id,
            title: self.title,
            content,
            is_favorite: self.is_favorite,
            is_work_log: self.is_work_log,
            is_trash: self.is_trash,
        })
    }
}

fn encode_tags(tags: &[String]) -> Result<String> {
    if tags.is_empty() {
        return Ok("[]".to_string());
    }
    Ok(serde_json::to_string(tags)?)
}

fn decode_tags(raw: Option<&str>, note_id: &str) -> Result<Vec<String>> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json).map_err(|e| MerlionError::InvalidFormat {
            message: format!("tags of note {} are not a JSON array: {}", note_id, e),
        }),
    }
}

fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str, note_id: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MerlionError::InvalidFormat {
            message: format!("timestamp '{}' of note {} is invalid: {}", raw, note_id, e),
        })
}

/// Storage precision of timestamps.
fn stored_precision(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

/// Note store backed by a single SQLite file.
pub struct SqlStore {
    name: String,
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqlStore {
    /// Opens the database at the default location.
    pub fn open_default() -> Result<Self> {
        let path = resolve_db_path()?;
        Self::open(&path)
    }

    /// Opens (creating if needed) the database at `path` and applies the
    /// embedded migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_migrations(path, EMBEDDED_MIGRATIONS)
    }

    pub fn open_with_migrations(path: &Path, migrations: &[Migration<'_>]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            helper::ensure_dir(parent, 0o750)?;
        }

        let mut conn = Connection::open(path).map_err(|e| {
            error!("Failed to open sqlite database at {}: {}", path.display(), e);
            MerlionError::Database(e)
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Journal mode: {}", journal_mode);

        let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).map_err(|e| {
            error!("Failed to ping database: {}", e);
            MerlionError::Database(e)
        })?;
        info!("Successfully connected to database: {}", path.display());
        restrict_db_file(path)?;

        migrations::apply_migrations(&mut conn, migrations).map_err(|e| {
            error!("Failed to apply migrations: {}", e);
            e
        })?;

        Ok(Self {
            name: SQL_STORE_NAME.to_string(),
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Overrides the display name (e.g. with the vault name from config).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current migration version of the schema.
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.lock()?;
        migrations::current_version(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MerlionError::LockAcquisitionFailed {
                message: "Failed to acquire lock on database connection".to_string(),
            })
    }

    fn fetch_live(conn: &Connection, note_id: &str) -> Result<Option<NoteRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE note_id = ?1 AND is_trash = 0", NOTE_COLUMNS),
                params![note_id],
                NoteRow::from_row,
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(unix)]
fn restrict_db_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_db_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl NoteStore for SqlStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Sql
    }

    async fn list(&self) -> Result<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE is_trash = 0",
            NOTE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], NoteRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let notes = rows
            .into_iter()
            .map(|row| row.into_note(false))
            .collect::<Result<Vec<_>>>()?;
        debug!("Listed {} notes from {}", notes.len(), self.path.display());
        Ok(notes)
    }

    async fn get(&self, note_id: &str) -> Result<Note> {
        trace!("Retrieving note by ID: {}", note_id);
        let conn = self.lock()?;
        match Self::fetch_live(&conn, note_id)? {
            Some(row) => row.into_note(true),
            None => Err(MerlionError::NoteNotFound {
                id: note_id.to_string(),
            }),
        }
    }

    async fn create(&self, req: &CreateNoteRequest) -> Result<Note> {
        req.validate()?;

        let note_id = Uuid::new_v4().to_string();
        let (created_at, updated_at) = req.timestamps(stored_precision(Utc::now()));
        let note = Note {
            note_id,
            title: req.title.clone(),
            content: Some(req.content.clone().unwrap_or_default()),
            tags: req.tags.clone(),
            is_favorite: req.is_favorite.unwrap_or(false),
            is_work_log: req.is_work_log.unwrap_or(false),
            is_trash: false,
            created_at: stored_precision(created_at),
            updated_at: stored_precision(updated_at),
        };

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO notes (note_id, title, content, tags, is_favorite, is_work_log, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                note.note_id,
                note.title,
                req.content,
                encode_tags(&note.tags)?,
                note.is_favorite,
                note.is_work_log,
                encode_time(&note.created_at),
                encode_time(&note.updated_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(MerlionError::NoteAlreadyExists { id: note.note_id });
            }
            Err(e) => {
                error!("Failed to insert note {}: {}", note.note_id, e);
                return Err(MerlionError::Database(e));
            }
        }

        info!("Created note {}", note.note_id);
        Ok(note)
    }

    async fn update(&self, note_id: &str, req: &CreateNoteRequest) -> Result<Note> {
        req.validate()?;

        let conn = self.lock()?;
        let existing = Self::fetch_live(&conn, note_id)?
            .ok_or_else(|| MerlionError::NoteNotFound {
                id: note_id.to_string(),
            })?
            .into_note(true)?;

        let stored_content = match &req.content {
            Some(content) => Some(content.clone()),
            None => conn.query_row(
                "SELECT content FROM notes WHERE note_id = ?1",
                params![note_id],
                |row| row.get::<_, Option<String>>(0),
            )?,
        };
        let is_favorite = req.is_favorite.unwrap_or(existing.is_favorite);
        let is_work_log = req.is_work_log.unwrap_or(existing.is_work_log);
        let updated_at = stored_precision(Utc::now()).max(existing.updated_at);

        conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, tags = ?3, is_favorite = ?4, \
             is_work_log = ?5, updated_at = ?6 WHERE note_id = ?7 AND is_trash = 0",
            params![
                req.title,
                stored_content,
                encode_tags(&req.tags)?,
                is_favorite,
                is_work_log,
                encode_time(&updated_at),
                note_id,
            ],
        )?;
        debug!("Updated note {}", note_id);

        Ok(Note {
            title: req.title.clone(),
            content: Some(stored_content.unwrap_or_default()),
            tags: req.tags.clone(),
            is_favorite,
            is_work_log,
            updated_at,
            ..existing
        })
    }

    async fn delete(&self, note_id: &str) -> Result<()> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE notes SET is_trash = 1 WHERE note_id = ?1 AND is_trash = 0",
            params![note_id],
        )?;
        if affected == 0 {
            debug!("Cannot delete note {}: Note not found", note_id);
            return Err(MerlionError::NoteNotFound {
                id: note_id.to_string(),
            });
        }
        info!("Moved note {} to trash", note_id);
        Ok(())
    }
}
