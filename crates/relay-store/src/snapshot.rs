use std::path::{Path, PathBuf};

use rusqlite::Connection;

use relay_core::time::snapshot_tag;

use crate::error::{Result, StoreError};
use crate::types::Document;

/// Paths produced by a snapshot, for logging/diagnostics.
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub backup: PathBuf,
    pub json_export: PathBuf,
    pub csv_export: PathBuf,
}

/// Write a full relational-file-copy + JSON export + CSV export snapshot
/// tagged with the current UTC time, ahead of a destructive batch operation
/// (§4.1 Backups). The caller must abort the destructive operation if this
/// returns an error.
pub fn write_snapshot(
    db_path: &Path,
    documents: &[Document],
    at: chrono::DateTime<chrono::Utc>,
) -> Result<SnapshotPaths> {
    let tag = snapshot_tag(at);

    let backup = db_path.with_extension(format!("backup-{tag}"));
    std::fs::copy(db_path, &backup)
        .map_err(|e| StoreError::SnapshotFailed(format!("relational copy failed: {e}")))?;

    let parent = db_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = db_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("store");

    let json_export = parent.join(format!("{stem}.export-{tag}.json"));
    let json = serde_json::to_vec_pretty(documents)?;
    std::fs::write(&json_export, json)
        .map_err(|e| StoreError::SnapshotFailed(format!("json export failed: {e}")))?;

    let csv_export = parent.join(format!("{stem}.export-{tag}.csv"));
    write_csv(&csv_export, documents)?;

    Ok(SnapshotPaths {
        backup,
        json_export,
        csv_export,
    })
}

fn write_csv(path: &Path, documents: &[Document]) -> Result<()> {
    let mut out = String::from("id,layer,doc_type,project,confidence,decay,created_at,updated_at\n");
    for doc in documents {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            csv_escape(&doc.id),
            doc.layer.map(|l| l.as_str()).unwrap_or(""),
            csv_escape(&doc.doc_type),
            csv_escape(doc.project.as_deref().unwrap_or("")),
            doc.confidence,
            doc.decay,
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ));
    }
    std::fs::write(path, out).map_err(|e| StoreError::SnapshotFailed(format!("csv export failed: {e}")))
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Snapshot directly from an open connection by loading all documents first.
/// Convenience wrapper used by the store's destructive-operation guards.
pub fn snapshot_before_destructive(
    conn: &Connection,
    db_path: &Path,
    load_all: impl FnOnce(&Connection) -> Result<Vec<Document>>,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<SnapshotPaths> {
    let documents = load_all(conn)?;
    write_snapshot(db_path, &documents, at)
}
