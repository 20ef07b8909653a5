//! Copying every note from one store into another.

use log::{debug, error, info, warn};

use crate::{ExportSummary, NoteStore, Result};

/// Recreates every note of `source` in `destination`.
///
/// Notes are read one by one so that their content is present, and created
/// with their original timestamps. A note that fails to read or create is
/// recorded in the summary and the run goes on; only a failure to list the
/// source aborts.
pub async fn export_notes(
    source: &dyn NoteStore,
    destination: &dyn NoteStore,
) -> Result<ExportSummary> {
    info!(
        "Exporting notes from {} to {}",
        source.name(),
        destination.name()
    );
    let listed = source.list().await.map_err(|e| {
        error!("Failed to list notes in {}: {}", source.name(), e);
        e
    })?;

    let mut summary = ExportSummary {
        source: source.name().to_string(),
        destination: destination.name().to_string(),
        total_notes: listed.len(),
        exported: 0,
        failed_notes: Vec::new(),
    };

    for meta in &listed {
        let note = match source.get(&meta.note_id).await {
            Ok(note) => note,
            Err(e) => {
                warn!("Failed to read note {}: {}", meta.title, e);
                summary.failed_notes.push((meta.title.clone(), e.to_string()));
                continue;
            }
        };

        match destination.create(&note.to_create_request()).await {
            Ok(created) => {
                debug!("Exported {} as {}", note.title, created.note_id);
                summary.exported += 1;
            }
            Err(e) => {
                warn!("Failed to export note {}: {}", note.title, e);
                summary.failed_notes.push((note.title.clone(), e.to_string()));
            }
        }
    }

    if summary.error_count() > 0 {
        error!(
            "Export finished with {} errors out of {} notes",
            summary.error_count(),
            summary.total_notes
        );
    } else {
        info!("Exported {} notes", summary.exported);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreateNoteRequest, FileStore, PermanentDelete};

    fn vault(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path().to_str().unwrap(), None)
            .unwrap()
            .with_trash(PermanentDelete)
    }

    #[tokio::test]
    async fn duplicates_are_counted_not_fatal() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let source = vault(&src_dir);
        let destination = vault(&dst_dir);

        source
            .create(&CreateNoteRequest::new("Shared").with_content("from source"))
            .await
            .unwrap();
        source.create(&CreateNoteRequest::new("Unique")).await.unwrap();
        destination.create(&CreateNoteRequest::new("Shared")).await.unwrap();

        let summary = export_notes(&source, &destination).await.unwrap();
        assert_eq!(summary.total_notes, 2);
        assert_eq!(summary.exported, 1);
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.failed_notes[0].0, "Shared");

        let kept = destination.get("Shared").await.unwrap();
        assert_eq!(kept.content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn empty_source_exports_nothing() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let summary = export_notes(&vault(&src_dir), &vault(&dst_dir)).await.unwrap();
        assert_eq!(summary.total_notes, 0);
        assert_eq!(summary.exported, 0);
    }
}
