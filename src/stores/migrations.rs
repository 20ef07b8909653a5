//! Versioned schema migrations for the embedded database.
//!
//! Scripts are named `NNN__description.sql` and compiled into the binary.
//! A single-row `merlion_version` table records the highest version applied;
//! a script runs only if its number is strictly greater than that, and the
//! stored version never decreases.

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{MerlionError, Result};

pub const INITIAL_VERSION: i64 = 0;

const VERSION_ROW_ID: &str = "version";

/// One migration script.
#[derive(Debug, Clone, Copy)]
pub struct Migration<'a> {
    pub file_name: &'a str,
    pub sql: &'a str,
}

/// Scripts shipped with the crate, from the `migrations/` directory.
pub const EMBEDDED_MIGRATIONS: &[Migration<'static>] = &[
    Migration {
        file_name: "001__create_notes_table.sql",
        sql: include_str!("../../migrations/001__create_notes_table.sql"),
    },
    Migration {
        file_name: "002__index_live_notes.sql",
        sql: include_str!("../../migrations/002__index_live_notes.sql"),
    },
];

/// Extracts the version number of a script.
///
/// Returns `Ok(None)` for files that are not `.sql` (they are ignored), and
/// an error for `.sql` files that do not follow `NNN__description.sql`.
pub fn parse_version(file_name: &str) -> Result<Option<i64>> {
    let Some(stem) = file_name.strip_suffix(".sql") else {
        return Ok(None);
    };

    let invalid = |reason: &str| MerlionError::Migration {
        file: file_name.to_string(),
        message: format!(
            "{}; expected NNN__description.sql, like 024__adding_something.sql",
            reason
        ),
    };

    let parts: Vec<&str> = stem.split("__").collect();
    if parts.len() != 2 {
        return Err(invalid("file name must contain exactly one '__'"));
    }
    let (prefix, description) = (parts[0], parts[1]);
    if prefix.len() < 3 || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("prefix must be at least three digits"));
    }
    if description.is_empty() {
        return Err(invalid("description is empty"));
    }

    let version = prefix
        .parse::<i64>()
        .map_err(|_| invalid("prefix is not a number"))?;
    Ok(Some(version))
}

/// Filters, validates and sorts scripts by version.
pub fn ordered<'a>(migrations: &[Migration<'a>]) -> Result<Vec<(i64, Migration<'a>)>> {
    let mut ordered = Vec::with_capacity(migrations.len());
    for migration in migrations {
        if let Some(version) = parse_version(migration.file_name)? {
            ordered.push((version, *migration));
        }
    }
    ordered.sort_by_key(|(version, _)| *version);

    if let Some(pair) = ordered.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(MerlionError::Migration {
            file: pair[1].1.file_name.to_string(),
            message: format!("duplicate version {} (also {})", pair[1].0, pair[0].1.file_name),
        });
    }
    Ok(ordered)
}

fn version_table_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'merlion_version'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns the stored schema version, creating the version table at
/// [`INITIAL_VERSION`] on first use.
pub fn current_version(conn: &Connection) -> Result<i64> {
    if !version_table_exists(conn)? {
        debug!("Creating merlion_version table");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS merlion_version (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL
            )",
        )?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO merlion_version (id, version) VALUES (?1, ?2)",
        params![VERSION_ROW_ID, INITIAL_VERSION],
    )?;

    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM merlion_version WHERE id = ?1",
            params![VERSION_ROW_ID],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(INITIAL_VERSION))
}

/// Applies every script newer than the stored version, in order.
///
/// Each script and its version stamp commit together; a failure leaves the
/// database at the last fully applied version. Returns how many scripts ran.
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration<'_>]) -> Result<usize> {
    let current = current_version(conn)?;
    info!("DB currently stamped at: #{}", current);

    let mut applied = 0;
    for (version, migration) in ordered(migrations)? {
        if version <= current {
            continue;
        }

        info!("Applying migration {} (version {})", migration.file_name, version);
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| MerlionError::Migration {
                file: migration.file_name.to_string(),
                message: e.to_string(),
            })?;
        tx.execute(
            "UPDATE merlion_version SET version = ?1 WHERE id = ?2",
            params![version, VERSION_ROW_ID],
        )?;
        tx.commit()?;
        applied += 1;
    }

    info!("Applied {} migrations", applied);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: Migration<'static> = Migration {
        file_name: "001__create.sql",
        sql: "CREATE TABLE a (id INTEGER);",
    };
    const ALTER: Migration<'static> = Migration {
        file_name: "002__alter.sql",
        sql: "ALTER TABLE a ADD COLUMN name TEXT;",
    };

    #[test]
    fn parses_prefixes() {
        assert_eq!(parse_version("001__init.sql").unwrap(), Some(1));
        assert_eq!(parse_version("1024__big_one.sql").unwrap(), Some(1024));
        assert_eq!(parse_version("README.md").unwrap(), None);
        assert!(parse_version("1__short.sql").is_err());
        assert!(parse_version("001_single_underscore.sql").is_err());
        assert!(parse_version("abc__letters.sql").is_err());
        assert!(parse_version("001__.sql").is_err());
    }

    #[test]
    fn orders_numerically_and_skips_other_files() {
        let notes = Migration {
            file_name: "notes.txt",
            sql: "",
        };
        let later = Migration {
            file_name: "010__later.sql",
            sql: "",
        };
        let ordered = ordered(&[later, notes, ALTER, CREATE]).unwrap();
        let versions: Vec<i64> = ordered.iter().map(|(v, _)| *v).collect();
        assert_eq!(versions, vec![1, 2, 10]);
    }

    #[test]
    fn rejects_duplicate_versions() {
        let twin = Migration {
            file_name: "001__twin.sql",
            sql: "",
        };
        assert!(ordered(&[CREATE, twin]).is_err());
    }

    #[test]
    fn fresh_database_starts_at_initial_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), INITIAL_VERSION);
        assert_eq!(current_version(&conn).unwrap(), INITIAL_VERSION);
    }

    #[test]
    fn applies_once_then_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn, &[CREATE, ALTER]).unwrap(), 2);
        assert_eq!(current_version(&conn).unwrap(), 2);
        assert_eq!(apply_migrations(&mut conn, &[CREATE, ALTER]).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn failed_script_keeps_last_good_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = Migration {
            file_name: "003__broken.sql",
            sql: "THIS IS NOT SQL;",
        };
        let err = apply_migrations(&mut conn, &[CREATE, ALTER, broken]).unwrap_err();
        assert!(matches!(err, MerlionError::Migration { .. }));
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn embedded_scripts_are_well_formed() {
        let ordered = ordered(EMBEDDED_MIGRATIONS).unwrap();
        assert_eq!(ordered.len(), EMBEDDED_MIGRATIONS.len());
    }
}
