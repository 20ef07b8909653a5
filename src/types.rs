//! Small shared types: the crate `Result`, store kinds and run summaries.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MerlionError;

/// A specialized Result type for merlion operations.
pub type Result<T> = std::result::Result<T, MerlionError>;

/// The three families of note backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sql,
    File,
    Remote,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreKind::Sql => "sql",
            StoreKind::File => "file",
            StoreKind::Remote => "remote",
        };
        f.write_str(name)
    }
}

impl FromStr for StoreKind {
    type Err = MerlionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sql" => Ok(StoreKind::Sql),
            "file" => Ok(StoreKind::File),
            "remote" => Ok(StoreKind::Remote),
            other => Err(MerlionError::ConfigError {
                message: format!("unknown provider '{}', expected sql, file or remote", other),
            }),
        }
    }
}

/// Summary of an export from one store into another
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Display name of the store notes were read from
    pub source: String,
    /// Display name of the store notes were created in
    pub destination: String,
    /// Total number of notes listed by the source
    pub total_notes: usize,
    /// Number of notes successfully created in the destination
    pub exported: usize,
    /// Details about notes that failed to export
    pub failed_notes: Vec<(String, String)>, // (title, error_message)
}

impl ExportSummary {
    pub fn error_count(&self) -> usize {
        self.failed_notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("sql".parse::<StoreKind>().unwrap(), StoreKind::Sql);
        assert_eq!(" File ".parse::<StoreKind>().unwrap(), StoreKind::File);
        assert_eq!(StoreKind::Remote.to_string(), "remote");
        assert!("sqlite".parse::<StoreKind>().is_err());
    }
}
