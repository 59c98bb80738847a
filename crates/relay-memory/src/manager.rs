use std::sync::Arc;

use tracing::{debug, warn};

use relay_core::scale;
use relay_store::{Document, Layer, NewDocument, Store};

use relay_retrieval::Embedder;

use crate::confidence::semantic_confidence;
use crate::contradiction::is_potential_contradiction;
use crate::envelope::{deep_merge, empty_object, merge_steps};
use crate::error::{MemoryError, Result};
use crate::router;

/// Outcome of a `learn` call: the written/updated document plus an optional
/// non-fatal warning (§4.3 Contradiction hint).
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    pub document: Document,
    pub potential_contradiction: Option<String>,
}

pub struct MemoryManager {
    store: Arc<Store>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryManager {
    pub fn new(store: Arc<Store>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// §4.3 Learning router entry point. `layer` overrides the heuristic
    /// when the caller already knows where this belongs.
    pub async fn learn(
        &self,
        content: &str,
        layer: Option<Layer>,
        origin: &str,
        source_path: Option<&str>,
        created_by: Option<&str>,
        project: Option<&str>,
    ) -> Result<LearnOutcome> {
        let layer = layer.unwrap_or_else(|| router::route(content));
        match layer {
            Layer::UserModel => self.learn_user_model(created_by.unwrap_or("default"), content).await,
            Layer::Procedural => self.learn_procedural(content, origin, project).await,
            Layer::Episodic => self.record_episodic(content, origin, project).await,
            Layer::Semantic => self.learn_semantic(content, origin, source_path, project).await,
        }
    }

    async fn learn_semantic(
        &self,
        content: &str,
        origin: &str,
        source_path: Option<&str>,
        project: Option<&str>,
    ) -> Result<LearnOutcome> {
        let embedding = self.embedder.embed(content).await;
        let confidence = semantic_confidence(origin, source_path);

        let mut warning = None;
        if let Some(embedding) = &embedding {
            if let Ok(hits) = self.store.vector_search(embedding, 1) {
                if let Some(top) = hits.first() {
                    if let Ok(existing) = self.store.get(&top.doc_id) {
                        if is_potential_contradiction(top.score, content, &existing.content) {
                            warning = Some(existing.id.clone());
                            warn!(existing_id = %existing.id, "potential contradiction on semantic write");
                        }
                    }
                }
            }
        }

        let document = self.store.create(NewDocument {
            layer: Some(Layer::Semantic),
            doc_type: "semantic".into(),
            source_path: source_path.map(str::to_string),
            content: content.to_string(),
            origin: origin.to_string(),
            project: project.map(str::to_string),
            confidence,
            expires_at: None,
            is_private: false,
            created_by: None,
            concepts: empty_object(),
            embedding,
        })?;

        Ok(LearnOutcome {
            document,
            potential_contradiction: warning,
        })
    }

    async fn learn_procedural(&self, content: &str, origin: &str, project: Option<&str>) -> Result<LearnOutcome> {
        let trigger = extract_trigger(content);
        let existing = self
            .store
            .list(Some(Layer::Procedural), project, 500)?
            .into_iter()
            .find(|d| d.concepts.get("trigger").and_then(|v| v.as_str()) == Some(trigger.as_str()));

        let embedding = self.embedder.embed(content).await;

        let document = match existing {
            Some(doc) => {
                let existing_steps: Vec<String> = doc
                    .concepts
                    .get("steps")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let new_steps = extract_steps(content);
                let merged_steps = merge_steps(&existing_steps, &new_steps);
                let concepts = serde_json::json!({ "trigger": trigger, "steps": merged_steps });
                self.store.update_content(&doc.id, content, &concepts, embedding.as_deref())?
            }
            None => self.store.create(NewDocument {
                layer: Some(Layer::Procedural),
                doc_type: "procedural".into(),
                source_path: None,
                content: content.to_string(),
                origin: origin.to_string(),
                project: project.map(str::to_string),
                confidence: 60,
                expires_at: None,
                is_private: false,
                created_by: None,
                concepts: serde_json::json!({ "trigger": trigger, "steps": extract_steps(content) }),
                embedding,
            })?,
        };

        Ok(LearnOutcome {
            document,
            potential_contradiction: None,
        })
    }

    /// Record usage of a procedural document: increments its success
    /// counter and bumps confidence upward, capped (§4.3).
    pub fn procedural_usage(&self, id: &str) -> Result<Document> {
        let doc = self.store.get(id)?;
        let usage_count = doc.concepts.get("usage_count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        let mut concepts = doc.concepts.clone();
        concepts["usage_count"] = serde_json::json!(usage_count);
        let new_confidence = crate::confidence::bump_procedural_confidence(doc.confidence, 2);
        self.store.update_content(id, &doc.content, &concepts, None)?;
        self.store.update_decay(id, doc.decay, new_confidence)?;
        self.store.touch_access(id)?;
        self.store.get(id)
    }

    /// Upsert the single user-model document for `user_id` via deep merge
    /// (§4.3: arrays replaced, objects merged, undefined skipped, null written).
    async fn learn_user_model(&self, user_id: &str, patch_json: &str) -> Result<LearnOutcome> {
        let patch: serde_json::Value = serde_json::from_str(patch_json)
            .unwrap_or_else(|_| serde_json::json!({ "note": patch_json }));
        let document = self.upsert_user_model(user_id, &patch).await?;
        Ok(LearnOutcome {
            document,
            potential_contradiction: None,
        })
    }

    pub async fn upsert_user_model(&self, user_id: &str, patch: &serde_json::Value) -> Result<Document> {
        let existing = self.get_user_model(user_id)?;
        let mut merged = match &existing {
            Some(doc) => doc.concepts.clone(),
            None => empty_object(),
        };
        deep_merge(&mut merged, patch);

        match existing {
            Some(doc) => self.store.update_content(&doc.id, user_id, &merged, None),
            None => self.store.create(NewDocument {
                layer: Some(Layer::UserModel),
                doc_type: "user_model".into(),
                source_path: None,
                content: user_id.to_string(),
                origin: "user".into(),
                project: None,
                confidence: scale::float_to_int(0.95),
                expires_at: None,
                is_private: true,
                created_by: Some(user_id.to_string()),
                concepts: merged,
                embedding: None,
            }),
        }
        .map_err(MemoryError::from)
    }

    pub fn get_user_model(&self, user_id: &str) -> Result<Option<Document>> {
        let docs = self.store.list(Some(Layer::UserModel), None, 5000)?;
        Ok(docs.into_iter().find(|d| d.content == user_id))
    }

    pub fn delete_user_model(&self, user_id: &str) -> Result<()> {
        let doc = self
            .get_user_model(user_id)?
            .ok_or_else(|| MemoryError::NotFound(user_id.to_string()))?;
        self.store.delete(&doc.id)?;
        Ok(())
    }

    pub async fn record_episodic(&self, content: &str, origin: &str, project: Option<&str>) -> Result<LearnOutcome> {
        let embedding = self.embedder.embed(content).await;
        let document = self.store.create(NewDocument {
            layer: Some(Layer::Episodic),
            doc_type: "episode".into(),
            source_path: None,
            content: content.to_string(),
            origin: origin.to_string(),
            project: project.map(str::to_string),
            confidence: 60,
            expires_at: Some(chrono::Utc::now() + chrono::Duration::days(crate::purge::EPISODIC_TTL_DAYS)),
            is_private: false,
            created_by: None,
            concepts: serde_json::json!({ "recorded_at": chrono::Utc::now().to_rfc3339() }),
            embedding,
        })?;
        debug!(doc_id = %document.id, "recorded episodic memory");
        Ok(LearnOutcome {
            document,
            potential_contradiction: None,
        })
    }

    /// Lexical-first search scoped to the episodic layer, ordered by
    /// recorded-at descending (§4.3).
    pub fn search_episodic(&self, query: &str, project: Option<&str>, limit: usize) -> Result<Vec<Document>> {
        let hits = self.store.fts_search(query, limit * 3)?;
        let mut docs: Vec<Document> = hits
            .into_iter()
            .filter_map(|h| self.store.get(&h.doc_id).ok())
            .filter(|d| matches!(d.layer, Some(Layer::Episodic)))
            .filter(|d| project.map(|p| d.project.as_deref() == Some(p)).unwrap_or(true))
            .collect();
        docs.sort_by(|a, b| {
            let a_recorded = a.concepts.get("recorded_at").and_then(|v| v.as_str()).unwrap_or("");
            let b_recorded = b.concepts.get("recorded_at").and_then(|v| v.as_str()).unwrap_or("");
            b_recorded.cmp(a_recorded)
        });
        docs.truncate(limit);
        Ok(docs)
    }

    pub fn procedural_search(&self, query: &str, project: Option<&str>, limit: usize) -> Result<Vec<Document>> {
        let hits = self.store.fts_search(query, limit * 3)?;
        let docs = hits
            .into_iter()
            .filter_map(|h| self.store.get(&h.doc_id).ok())
            .filter(|d| matches!(d.layer, Some(Layer::Procedural)))
            .filter(|d| project.map(|p| d.project.as_deref() == Some(p)).unwrap_or(true))
            .take(limit)
            .collect();
        Ok(docs)
    }

    pub fn purge_expired_episodic(&self) -> Result<Vec<(String, crate::purge::PurgeOutcome)>> {
        crate::purge::purge_expired_episodic(&self.store, chrono::Utc::now())
    }

    pub fn consolidate_semantic(&self) -> Result<Vec<crate::consolidation::ConsolidationAction>> {
        let store = self.store.clone();
        crate::consolidation::consolidate(&store, |a, b| cheap_vector_similarity(a, b))
    }
}

/// Best-effort synchronous similarity estimate used only by the
/// consolidation sweep when no async embedder call is in flight; falls
/// back to lexical overlap.
fn cheap_vector_similarity(a: &str, b: &str) -> f32 {
    crate::contradiction::jaccard_similarity(a, b)
}

fn extract_trigger(content: &str) -> String {
    let lowered = content.to_lowercase();
    if let Some(idx) = lowered.find("when ") {
        let rest = &content[idx + "when ".len()..];
        let end = rest.find(" then").or_else(|| rest.find(',')).unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }
    content.chars().take(40).collect()
}

fn extract_steps(content: &str) -> Vec<String> {
    if let Some(idx) = content.to_lowercase().find("then ") {
        let rest = &content[idx + "then ".len()..];
        return rest.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    vec![content.to_string()]
}
