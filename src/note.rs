//! Core data structures shared by every note backend.
//!
//! [`Note`] is the record all stores agree on, and [`CreateNoteRequest`] is
//! the input for both create and update. Their serde field names are the
//! wire names of the remote note service.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MerlionError, Result};

/// Characters a title may not contain when it doubles as a file name.
pub const FORBIDDEN_TITLE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier, unique within the store that produced the note
    pub note_id: String,
    /// Note title
    pub title: String,
    /// Note body. `None` means "not loaded", which is distinct from empty.
    #[serde(default)]
    pub content: Option<String>,
    /// Tags for organization
    #[serde(default, deserialize_with = "nullable_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_work_log: bool,
    #[serde(default)]
    pub is_trash: bool,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Tags as a set; ordering and duplicates are not significant.
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.tags.iter().cloned().collect()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Builds a request that recreates this note elsewhere, timestamps included.
    pub fn to_create_request(&self) -> CreateNoteRequest {
        CreateNoteRequest {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            is_favorite: Some(self.is_favorite),
            is_work_log: Some(self.is_work_log),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

/// Input for create and update.
///
/// Absent flags mean "backend default" on create and "leave unchanged" on
/// update. Absent content is stored as absent on create and left unchanged
/// on update. Tags are always replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: Option<String>,
    /// Always serialized, so an empty list clears the tags remotely.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_work_log: Option<bool>,
    /// Honoured only by stores that accept caller-supplied timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CreateNoteRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = Some(is_favorite);
        self
    }

    pub fn work_log(mut self, is_work_log: bool) -> Self {
        self.is_work_log = Some(is_work_log);
        self
    }

    /// Resolves creation timestamps, keeping `updated_at >= created_at`.
    pub fn timestamps(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let created_at = self.created_at.unwrap_or(now);
        let updated_at = self.updated_at.unwrap_or(now).max(created_at);
        (created_at, updated_at)
    }

    /// Rejects requests no store may persist.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(MerlionError::InvalidNote {
                message: "title must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Checks that a title is usable as a file name.
pub fn validate_file_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(MerlionError::InvalidNote {
            message: "title must not be empty".to_string(),
        });
    }
    if let Some(c) = title.chars().find(|c| FORBIDDEN_TITLE_CHARS.contains(c)) {
        return Err(MerlionError::InvalidNote {
            message: format!("title '{}' contains forbidden character '{}'", title, c),
        });
    }
    Ok(())
}

// The service sends `"tags": null` for untagged notes.
fn nullable_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
