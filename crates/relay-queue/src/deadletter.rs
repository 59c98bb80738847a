use std::path::Path;

use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::types::DeadLetterRecord;

/// Write one dead-letter record as a standalone JSON file under
/// `dead-letter/` (§6 persisted state layout). Each record is self-contained
/// so an operator can inspect it without the queue database.
pub fn write(dir: &Path, record: &DeadLetterRecord) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", record.id));
    let tmp_path = dir.join(format!("{}.json.tmp", record.id));

    let body = serde_json::to_vec_pretty(record)?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, &path)?;

    warn!(
        conversation = %record.conversation,
        reason = %record.reason,
        path = %path.display(),
        "wrote dead-letter record"
    );
    Ok(())
}

pub fn new_record(
    conversation: &str,
    messages: Vec<relay_core::types::Message>,
    reason: impl Into<String>,
    attempt: u32,
) -> DeadLetterRecord {
    DeadLetterRecord {
        id: Uuid::new_v4().to_string(),
        conversation: conversation.to_string(),
        messages,
        reason: reason.into(),
        attempt,
        recorded_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_a_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let record = new_record("c1", vec![], "attempt cap reached", 5);
        write(dir.path(), &record).unwrap();

        let path = dir.path().join(format!("{}.json", record.id));
        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("attempt cap reached"));
    }
}
