use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use relay_store::db::EMBEDDING_DIM;

/// Produces the embedding vector backing vector search. Real deployments
/// call out to an embedding service; the agent program and any model
/// weights are external collaborators (out of scope here), so a
/// deterministic fallback is used by default and tests can supply a fake.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Hashes tokens into a fixed-width vector. Never fails — used as the
/// default so vector search always has candidates without a live backend,
/// and as a stand-in while `RELAY_VECTOR_BACKEND_URL` is unset.
pub struct HashingEmbedder;

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % EMBEDDING_DIM;
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        Some(v)
    }
}

/// Calls an external embedding HTTP backend; degrades to `None` on any
/// failure so the retrieval path can fall back to lexical-only (§4.2 Failure).
pub struct RemoteEmbedder {
    client: reqwest::Client,
    url: String,
}

impl RemoteEmbedder {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        let arr = body.get("embedding")?.as_array()?;
        let vec: Vec<f32> = arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
        if vec.len() == EMBEDDING_DIM {
            Some(vec)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder;
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn hashing_embedder_distinguishes_different_text() {
        let embedder = HashingEmbedder;
        let a = embedder.embed("deploy the service").await.unwrap();
        let b = embedder.embed("bake a cake").await.unwrap();
        assert_ne!(a, b);
    }
}
