use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, error, trace};
use tempfile::NamedTempFile;

use crate::{MerlionError, Result};

/// Creates `path` (and parents) if missing, restricting it to `mode` on Unix.
pub fn ensure_dir(path: &Path, mode: u32) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            error!("Path exists but is not a directory: {}", path.display());
            return Err(MerlionError::DirectoryError {
                path: path.to_path_buf(),
            });
        }
        return Ok(());
    }

    debug!("Creating directory: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed to create directory {}: {}", path.display(), e);
        MerlionError::DirectoryError {
            path: path.to_path_buf(),
        }
    })?;
    set_mode(path, mode)?;
    Ok(())
}

/// Writes `bytes` to `path` through a temp file in the same directory, then
/// renames it into place, so readers never observe a half-written file.
pub fn atomic_write(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    trace!("Creating temporary file in directory: {}", dir.display());
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file: {}", e);
        MerlionError::Io(e)
    })?;

    temp_file.write_all(bytes).map_err(|e| {
        error!("Failed to write to temporary file: {}", e);
        MerlionError::Io(e)
    })?;
    temp_file.flush()?;

    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist file {}: {}", path.display(), e.error);
        MerlionError::Io(e.error)
    })?;
    set_mode(path, mode)?;

    trace!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Expands a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| MerlionError::ConfigError {
            message: "failed to get user home directory".to_string(),
        })?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(path))
}

/// Parses a header timestamp, trying the accepted layouts in order.
///
/// Layouts without an offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%:z") {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&t));
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|t| Utc.from_utc_datetime(&t));
    }
    None
}
