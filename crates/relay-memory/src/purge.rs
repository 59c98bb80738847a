use std::sync::Arc;

use tracing::info;

use relay_store::{Layer, Store};

use crate::error::Result;

/// Episodic TTL, from creation (§4.3 episodic layer).
pub const EPISODIC_TTL_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    Archived,
    Removed,
}

/// Purge expired episodic documents: archive (demote layer to null, clear
/// TTL, halve decay, replace the envelope with a short archived form) when
/// the payload is still parseable, otherwise remove outright (§4.3).
pub fn purge_expired_episodic(store: &Arc<Store>, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<(String, PurgeOutcome)>> {
    let expired: Vec<_> = store
        .list_all()?
        .into_iter()
        .filter(|d| matches!(d.layer, Some(Layer::Episodic)) && d.is_expired(now))
        .collect();

    let mut outcomes = Vec::new();
    for doc in expired {
        if let Some(archived_form) = archived_form(&doc.concepts) {
            store.update_content(&doc.id, &doc.content, &archived_form, None)?;
            let new_decay = (doc.decay as u16 / 2) as u8;
            store.update_decay(&doc.id, new_decay, doc.confidence)?;
            store.archive_layer(&doc.id)?;
            info!(doc_id = %doc.id, "archived expired episodic document");
            outcomes.push((doc.id, PurgeOutcome::Archived));
        } else {
            store.delete(&doc.id)?;
            info!(doc_id = %doc.id, "removed expired episodic document (unparseable envelope)");
            outcomes.push((doc.id, PurgeOutcome::Removed));
        }
    }
    Ok(outcomes)
}

/// Produce a short archived-form envelope if the original concepts payload
/// is still parseable; `None` means the document should be removed instead.
fn archived_form(concepts: &serde_json::Value) -> Option<serde_json::Value> {
    if !concepts.is_object() {
        return None;
    }
    let summary = concepts
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Some(serde_json::json!({ "archived": true, "summary": summary }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::NewDocument;

    fn expired_episodic(concepts: serde_json::Value) -> NewDocument {
        NewDocument {
            layer: Some(Layer::Episodic),
            doc_type: "episode".into(),
            source_path: None,
            content: "user deployed v0.6.0".into(),
            origin: "test".into(),
            project: None,
            confidence: 60,
            expires_at: Some(chrono::Utc::now() - chrono::Duration::days(1)),
            is_private: false,
            created_by: None,
            concepts,
            embedding: None,
        }
    }

    #[test]
    fn parseable_envelope_is_archived() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let doc = store
            .create(expired_episodic(serde_json::json!({"summary": "deployed v0.6.0"})))
            .unwrap();

        let outcomes = purge_expired_episodic(&store, chrono::Utc::now()).unwrap();
        assert_eq!(outcomes, vec![(doc.id.clone(), PurgeOutcome::Archived)]);

        let fetched = store.get(&doc.id).unwrap();
        assert_eq!(fetched.concepts["archived"], true);
        assert_eq!(fetched.layer, None);
        assert_eq!(fetched.expires_at, None);
    }

    #[test]
    fn unparseable_envelope_is_removed() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let doc = store.create(expired_episodic(serde_json::Value::Null)).unwrap();

        let outcomes = purge_expired_episodic(&store, chrono::Utc::now()).unwrap();
        assert_eq!(outcomes, vec![(doc.id.clone(), PurgeOutcome::Removed)]);
        assert!(store.get(&doc.id).is_err());
    }

    #[test]
    fn non_expired_documents_are_untouched() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut new_doc = expired_episodic(serde_json::json!({"summary": "fresh"}));
        new_doc.expires_at = Some(chrono::Utc::now() + chrono::Duration::days(1));
        store.create(new_doc).unwrap();

        let outcomes = purge_expired_episodic(&store, chrono::Utc::now()).unwrap();
        assert!(outcomes.is_empty());
    }
}
