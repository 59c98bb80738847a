use serde::{Deserialize, Serialize};

/// One of the four typed memory layers, or legacy (`None` in storage, §3/GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    UserModel,
    Procedural,
    Semantic,
    Episodic,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::UserModel => "user_model",
            Layer::Procedural => "procedural",
            Layer::Semantic => "semantic",
            Layer::Episodic => "episodic",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_model" => Ok(Layer::UserModel),
            "procedural" => Ok(Layer::Procedural),
            "semantic" => Ok(Layer::Semantic),
            "episodic" => Ok(Layer::Episodic),
            other => Err(format!("unknown layer: {other}")),
        }
    }
}

/// A durable knowledge-store entry (§3 Document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// `None` is legacy/pre-migration (treated as semantic for retrieval).
    pub layer: Option<Layer>,
    pub doc_type: String,
    pub source_path: Option<String>,
    pub content: String,
    pub content_indexed: bool,
    pub origin: String,
    pub project: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub access_count: i64,
    pub last_accessed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Stored 0..100; see `relay_core::scale`.
    pub confidence: u8,
    /// Stored 0..100; see `relay_core::scale`.
    pub decay: u8,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_private: bool,
    pub created_by: Option<String>,
    pub superseded_by: Option<String>,
    /// Layer-specific envelope (UserModel/ProceduralMemory/EpisodicMemory
    /// fields, or a free-form concept/tag bag for semantic documents).
    pub concepts: serde_json::Value,
}

impl Document {
    /// `user_model` documents never decay and never expire (§3 invariant).
    pub fn is_user_model(&self) -> bool {
        matches!(self.layer, Some(Layer::UserModel))
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self.expires_at {
            Some(at) => now >= at,
            None => false,
        }
    }
}

/// Fields required to insert a brand new document; the store fills in id,
/// timestamps, access bookkeeping, and decay.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub layer: Option<Layer>,
    pub doc_type: String,
    pub source_path: Option<String>,
    pub content: String,
    pub origin: String,
    pub project: Option<String>,
    pub confidence: u8,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_private: bool,
    pub created_by: Option<String>,
    pub concepts: serde_json::Value,
    /// Optional embedding vector for the vector collection. When `None`,
    /// only the lexical index is populated for this document.
    pub embedding: Option<Vec<f32>>,
}
