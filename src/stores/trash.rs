//! Moving deleted note files to the host's recycle facility.

use std::{
    fs,
    path::Path,
    process::{Command, Stdio},
};

use log::{debug, error};
use which::which;

use crate::{MerlionError, Result};

/// Something that can dispose of a note file.
pub trait Trash: Send + Sync {
    /// Moves `path` to the recycle facility, failing if there is none.
    fn trash(&self, path: &Path) -> Result<()>;
}

/// Uses the platform's own recycle bin.
///
/// macOS goes through the Finder scripting bridge, Windows through the
/// Shell's send-to-recycle-bin API, and other Unix systems through `gio`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl SystemTrash {
    fn command(path: &Path) -> Result<Command> {
        let abs = fs::canonicalize(path)?;
        let abs = abs.to_string_lossy();

        if cfg!(target_os = "macos") {
            let script = format!(
                "tell application \"Finder\" to delete POSIX file \"{}\"",
                abs.replace('"', "\\\"")
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Ok(cmd)
        } else if cfg!(windows) {
            let script = format!(
                "Add-Type -AssemblyName Microsoft.VisualBasic; \
                 [Microsoft.VisualBasic.FileIO.FileSystem]::DeleteFile('{}', \
                 'OnlyErrorDialogs', 'SendToRecycleBin')",
                abs.replace('\'', "''")
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-Command", &script]);
            Ok(cmd)
        } else {
            let gio = which("gio").map_err(|e| MerlionError::ApplicationError {
                message: format!("no trash helper available (gio): {}", e),
            })?;
            let mut cmd = Command::new(gio);
            cmd.arg("trash").arg(abs.as_ref());
            Ok(cmd)
        }
    }
}

impl Trash for SystemTrash {
    fn trash(&self, path: &Path) -> Result<()> {
        debug!("Moving {} to trash", path.display());
        let output = Self::command(path)?
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                error!("Failed to run trash helper: {}", e);
                MerlionError::Io(e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MerlionError::ApplicationError {
                message: format!("failed to move to trash: {}", stderr.trim()),
            });
        }
        Ok(())
    }
}

/// Removes files outright; for hosts without a recycle facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermanentDelete;

impl Trash for PermanentDelete {
    fn trash(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.md");
        fs::write(&path, "x").unwrap();
        PermanentDelete.trash(&path).unwrap();
        assert!(!path.exists());
        assert!(PermanentDelete.trash(&path).is_err());
    }
}
