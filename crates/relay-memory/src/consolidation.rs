use std::sync::Arc;

use tracing::info;

use relay_store::{Document, Layer, Store};

use crate::contradiction::jaccard_similarity;
use crate::error::Result;

const VECTOR_DUPLICATE_THRESHOLD: f32 = 0.92;
const JACCARD_DUPLICATE_THRESHOLD: f32 = 0.85;

/// One supersede decision made by a consolidation pass.
#[derive(Debug, Clone)]
pub struct ConsolidationAction {
    pub superseded_id: String,
    pub superseding_id: String,
}

/// Scan the semantic layer for near-duplicate clusters and supersede the
/// lower-confidence member of each pair toward the higher-confidence one
/// (§4.3 Consolidation). Never deletes — supersession is reversible by
/// reading the log. `similarity` computes vector similarity between two
/// documents' content (the store owns the embedding index).
pub fn consolidate(
    store: &Arc<Store>,
    similarity: impl Fn(&str, &str) -> f32,
) -> Result<Vec<ConsolidationAction>> {
    let docs: Vec<Document> = store
        .list_all()?
        .into_iter()
        .filter(|d| matches!(d.layer, Some(Layer::Semantic)) && d.superseded_by.is_none())
        .collect();

    let mut actions = Vec::new();
    let mut superseded: std::collections::HashSet<String> = std::collections::HashSet::new();

    for i in 0..docs.len() {
        if superseded.contains(&docs[i].id) {
            continue;
        }
        for j in (i + 1)..docs.len() {
            if superseded.contains(&docs[j].id) {
                continue;
            }
            let vec_sim = similarity(&docs[i].content, &docs[j].content);
            let jac_sim = jaccard_similarity(&docs[i].content, &docs[j].content);
            if vec_sim > VECTOR_DUPLICATE_THRESHOLD && jac_sim > JACCARD_DUPLICATE_THRESHOLD {
                let (keep, drop) = if docs[i].confidence >= docs[j].confidence {
                    (&docs[i], &docs[j])
                } else {
                    (&docs[j], &docs[i])
                };
                store.supersede(&drop.id, &keep.id, "consolidation: near-duplicate")?;
                superseded.insert(drop.id.clone());
                info!(superseded = %drop.id, by = %keep.id, "consolidated near-duplicate semantic document");
                actions.push(ConsolidationAction {
                    superseded_id: drop.id.clone(),
                    superseding_id: keep.id.clone(),
                });
            }
        }
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::NewDocument;

    fn new_doc(content: &str, confidence: u8) -> NewDocument {
        NewDocument {
            layer: Some(Layer::Semantic),
            doc_type: "note".into(),
            source_path: None,
            content: content.into(),
            origin: "test".into(),
            project: None,
            confidence,
            expires_at: None,
            is_private: false,
            created_by: None,
            concepts: serde_json::json!({}),
            embedding: None,
        }
    }

    #[test]
    fn near_duplicate_supersedes_lower_confidence() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let low = store.create(new_doc("the build takes two minutes", 50)).unwrap();
        let high = store.create(new_doc("the build takes 2 minutes", 90)).unwrap();

        let actions = consolidate(&store, |_, _| 0.95).unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].superseded_id, low.id);
        assert_eq!(actions[0].superseding_id, high.id);

        let fetched = store.get(&low.id).unwrap();
        assert_eq!(fetched.superseded_by.as_deref(), Some(high.id.as_str()));
    }

    #[test]
    fn dissimilar_documents_are_left_alone() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.create(new_doc("deploy the service", 50)).unwrap();
        store.create(new_doc("bake a cake", 90)).unwrap();

        let actions = consolidate(&store, |_, _| 0.1).unwrap();
        assert!(actions.is_empty());
    }
}
