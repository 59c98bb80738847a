use serde::{Deserialize, Serialize};

/// Which candidate source(s) produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Lexical,
    Vector,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Hybrid,
    Lexical,
    Vector,
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub doc_type: Option<String>,
    pub limit: usize,
    pub offset: usize,
    pub mode: SearchMode,
    pub project: Option<String>,
    pub layers: Option<Vec<relay_store::Layer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub document: relay_store::Document,
    pub score: f32,
    pub source: SourceTag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total_candidates: usize,
    pub warning: Option<String>,
}
