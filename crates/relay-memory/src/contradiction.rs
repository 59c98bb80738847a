use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "to", "of", "and", "or", "in", "on", "at", "for",
    "with", "it", "this", "that",
];

/// Stop-stripped Jaccard similarity over whitespace-tokenized words.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a = word_set(a);
    let set_b = word_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// A write proceeds but is flagged as a potential contradiction when the
/// candidate is a near-vector-duplicate of existing content but diverges
/// lexically (§4.3 Contradiction hint).
pub fn is_potential_contradiction(vector_similarity: f32, new_text: &str, existing_text: &str) -> bool {
    vector_similarity > 0.85 && jaccard_similarity(new_text, existing_text) < 0.7
}
