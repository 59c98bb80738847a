use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use relay_store::{Layer, Store};

use crate::cache::{CacheKey, RetrievalCache};
use crate::decay::{decay_score, recency_boost};
use crate::embedder::Embedder;
use crate::error::Result;
use crate::profile;
use crate::types::{SearchMode, SearchQuery, SearchResponse, SearchResultItem, SourceTag};

/// Reciprocal Rank Fusion constant (§4.2 step 6).
const RRF_K: f32 = 60.0;

pub struct RetrievalEngine {
    store: Arc<Store>,
    embedder: Arc<dyn Embedder>,
    cache: RetrievalCache,
    thai_nlp_url: Option<String>,
    http: reqwest::Client,
}

impl RetrievalEngine {
    pub fn new(store: Arc<Store>, embedder: Arc<dyn Embedder>, cache_ttl_secs: u64) -> Self {
        Self::with_thai_segmenter(store, embedder, cache_ttl_secs, None)
    }

    /// Same as [`RetrievalEngine::new`], but wires an optional Thai-language
    /// segmenter service used to normalize queries before FTS (§4.2 step 1).
    pub fn with_thai_segmenter(
        store: Arc<Store>,
        embedder: Arc<dyn Embedder>,
        cache_ttl_secs: u64,
        thai_nlp_url: Option<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            cache: RetrievalCache::new(std::time::Duration::from_secs(cache_ttl_secs)),
            thai_nlp_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse> {
        let key = CacheKey::new(
            &query.query,
            query.mode,
            query.limit,
            query.doc_type.as_deref(),
            query.project.as_deref(),
            query.layers.as_deref(),
        );
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let response = self.search_uncached(&query).await?;
        self.cache.put(key, response.clone());
        Ok(response)
    }

    async fn search_uncached(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let cleaned = self.sanitize_for_fts(&query.query).await;
        let profile = profile::classify(&cleaned);
        let mut weights = profile.weights();

        let pool_size = (query.limit + query.offset) * weights.candidate_multiplier;

        let fts_hits = if matches!(query.mode, SearchMode::Hybrid | SearchMode::Lexical) {
            self.store.fts_search(&cleaned, pool_size.max(1))?
        } else {
            Vec::new()
        };

        let mut warning = None;
        let vec_hits = if matches!(query.mode, SearchMode::Hybrid | SearchMode::Vector) {
            match self.embedder.embed(&cleaned).await {
                Some(embedding) => match self.store.vector_search(&embedding, pool_size.max(1)) {
                    Ok(hits) => hits,
                    Err(e) => {
                        warn!(error = %e, "vector search failed, degrading to lexical-only");
                        warning = Some("vector backend unavailable; results are lexical-only".to_string());
                        Vec::new()
                    }
                },
                None => {
                    if matches!(query.mode, SearchMode::Vector) {
                        warning = Some("vector backend unavailable; no embedding produced".to_string());
                    } else {
                        warning = Some("vector backend unavailable; results are lexical-only".to_string());
                    }
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if matches!(query.mode, SearchMode::Hybrid) {
            let mean_fts = mean_top_k(fts_hits.iter().map(|h| h.score), 5);
            let mean_vec = mean_top_k(vec_hits.iter().map(|h| h.score), 5);
            weights = profile::posterior_correct(weights, mean_fts, mean_vec);
        }

        let fts_rank: HashMap<&str, usize> = fts_hits
            .iter()
            .enumerate()
            .map(|(i, h)| (h.doc_id.as_str(), i + 1))
            .collect();
        let vec_rank: HashMap<&str, usize> = vec_hits
            .iter()
            .enumerate()
            .map(|(i, h)| (h.doc_id.as_str(), i + 1))
            .collect();

        let mut candidate_ids: Vec<String> = fts_hits.iter().map(|h| h.doc_id.clone()).collect();
        for h in &vec_hits {
            if !candidate_ids.contains(&h.doc_id) {
                candidate_ids.push(h.doc_id.clone());
            }
        }
        let total_candidates = candidate_ids.len();

        let mut scored: Vec<SearchResultItem> = Vec::new();
        let now = chrono::Utc::now();

        for id in candidate_ids {
            let doc = match self.store.get(&id) {
                Ok(d) => d,
                Err(_) => continue,
            };

            if doc.is_expired(now) {
                continue;
            }

            if let Some(project) = &query.project {
                let matches = doc.project.as_deref() == Some(project.as_str()) || doc.project.is_none();
                if !matches {
                    continue;
                }
            } else if doc.project.is_some() {
                continue;
            }

            if let Some(layers) = &query.layers {
                // Legacy (null) documents are treated as semantic for filtering.
                let effective = doc.layer.unwrap_or(Layer::Semantic);
                if !layers.contains(&effective) {
                    continue;
                }
            }

            if let Some(doc_type) = &query.doc_type {
                if &doc.doc_type != doc_type {
                    continue;
                }
            }

            let in_fts = fts_rank.contains_key(id.as_str());
            let in_vec = vec_rank.contains_key(id.as_str());
            let source = match (in_fts, in_vec) {
                (true, true) => SourceTag::Both,
                (true, false) => SourceTag::Lexical,
                (false, true) => SourceTag::Vector,
                (false, false) => continue,
            };

            let mut score = 0.0f32;
            if let Some(rank) = fts_rank.get(id.as_str()) {
                score += weights.w_fts / (RRF_K + *rank as f32);
            }
            if let Some(rank) = vec_rank.get(id.as_str()) {
                score += weights.w_vec / (RRF_K + *rank as f32);
            }

            let days_since_created = (now - doc.created_at).num_seconds() as f64 / 86400.0;
            score += recency_boost(days_since_created);

            let days_since_updated = (now - doc.updated_at).num_seconds() as f64 / 86400.0;
            let decay = decay_score(doc.layer, days_since_updated, doc.access_count);
            score *= decay as f32;

            score *= profile.layer_boost(doc.layer);

            scored.push(SearchResultItem {
                document: doc,
                score,
                source,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let paged: Vec<SearchResultItem> = scored
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        for item in &paged {
            let _ = self.store.touch_access(&item.document.id);
        }

        Ok(SearchResponse {
            results: paged,
            total_candidates,
            warning,
        })
    }

    /// Best-effort Thai segmentation: substitutes the segmented form when the
    /// configured service is reachable, otherwise passes the trimmed input
    /// through unchanged (§4.2 step 1).
    async fn sanitize_for_fts(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let Some(url) = &self.thai_nlp_url else {
            return trimmed.to_string();
        };
        if !trimmed.chars().any(is_thai_char) {
            return trimmed.to_string();
        }

        match self
            .http
            .post(url)
            .json(&serde_json::json!({ "text": trimmed }))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await {
                Ok(body) => body
                    .get("segmented")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| trimmed.to_string()),
                Err(_) => trimmed.to_string(),
            },
            _ => {
                warn!("thai segmenter unreachable, passing query through unsegmented");
                trimmed.to_string()
            }
        }
    }
}

fn is_thai_char(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}

fn mean_top_k(scores: impl Iterator<Item = f32>, k: usize) -> f32 {
    let mut values: Vec<f32> = scores.collect();
    values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let top = &values[..values.len().min(k)];
    if top.is_empty() {
        0.0
    } else {
        top.iter().sum::<f32>() / top.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use relay_store::NewDocument;

    fn new_doc(content: &str, layer: Option<Layer>) -> NewDocument {
        NewDocument {
            layer,
            doc_type: "note".into(),
            source_path: None,
            content: content.into(),
            origin: "test".into(),
            project: None,
            confidence: 60,
            expires_at: None,
            is_private: false,
            created_by: None,
            concepts: serde_json::json!({}),
            embedding: None,
        }
    }

    fn engine_with(store: Arc<Store>) -> RetrievalEngine {
        RetrievalEngine::new(store, Arc::new(HashingEmbedder), 5)
    }

    #[tokio::test]
    async fn lexical_search_finds_matching_document() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.create(new_doc("deploy with docker compose", Some(Layer::Semantic))).unwrap();
        let engine = engine_with(store);

        let response = engine
            .search(SearchQuery {
                query: "docker".into(),
                doc_type: None,
                limit: 10,
                offset: 0,
                mode: SearchMode::Lexical,
                project: None,
                layers: None,
            })
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert!(response.warning.is_none());
    }

    #[tokio::test]
    async fn procedural_gets_boosted_over_semantic_on_how_to_query() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .create(new_doc(
                "Docker compose deployment guide",
                Some(Layer::Semantic),
            ))
            .unwrap();
        store
            .create(new_doc(
                "When build fails, run clean install",
                Some(Layer::Procedural),
            ))
            .unwrap();
        let engine = engine_with(store);

        let response = engine
            .search(SearchQuery {
                query: "how to deploy when build fails".into(),
                doc_type: None,
                limit: 10,
                offset: 0,
                mode: SearchMode::Hybrid,
                project: None,
                layers: None,
            })
            .await
            .unwrap();

        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].document.doc_type, "note");
        assert!(matches!(
            response.results[0].document.layer,
            Some(Layer::Procedural)
        ));
    }

    #[tokio::test]
    async fn expired_document_is_excluded_from_results() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut doc = new_doc("deploy with docker compose", Some(Layer::Episodic));
        doc.expires_at = Some(chrono::Utc::now() - chrono::Duration::days(1));
        store.create(doc).unwrap();
        let engine = engine_with(store);

        let response = engine
            .search(SearchQuery {
                query: "docker".into(),
                doc_type: None,
                limit: 10,
                offset: 0,
                mode: SearchMode::Lexical,
                project: None,
                layers: None,
            })
            .await
            .unwrap();

        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn sanitize_without_thai_segmenter_just_trims() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = engine_with(store);
        assert_eq!(engine.sanitize_for_fts("  docker  ").await, "docker");
    }

    #[tokio::test]
    async fn sanitize_passes_through_when_segmenter_unreachable() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = RetrievalEngine::with_thai_segmenter(
            store,
            Arc::new(HashingEmbedder),
            5,
            Some("http://127.0.0.1:1/segment".to_string()),
        );
        let thai_text = "สวัสดี";
        assert_eq!(engine.sanitize_for_fts(thai_text).await, thai_text);
    }

    #[tokio::test]
    async fn second_search_is_served_from_cache() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.create(new_doc("deploy with docker compose", Some(Layer::Semantic))).unwrap();
        let engine = engine_with(store);

        let q = SearchQuery {
            query: "docker".into(),
            doc_type: None,
            limit: 10,
            offset: 0,
            mode: SearchMode::Lexical,
            project: None,
            layers: None,
        };
        let first = engine.search(q.clone()).await.unwrap();
        let second = engine.search(q).await.unwrap();
        assert_eq!(first.total_candidates, second.total_candidates);
    }
}
