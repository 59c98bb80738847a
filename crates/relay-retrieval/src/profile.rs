/// Query profile classified by lexical heuristics (§4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryProfile {
    ExactLookup,
    SemanticHowTo,
    SemanticRecall,
    Mixed,
}

/// Prior weights `(wFts, wVec)` summing to 1, and the candidate-pool
/// multiplier applied to `limit` before fusion.
#[derive(Debug, Clone, Copy)]
pub struct ProfileWeights {
    pub w_fts: f32,
    pub w_vec: f32,
    pub candidate_multiplier: usize,
}

const HOW_TO_MARKERS: &[&str] = &["how to", "how do i", "how does", "steps to", "guide"];
const RECALL_MARKERS: &[&str] = &["remember", "what did", "when did", "recall", "last time"];

/// Classify a free-text query into one of the four profiles.
pub fn classify(query: &str) -> QueryProfile {
    let q = query.to_lowercase();
    let is_quoted = q.starts_with('"') && q.ends_with('"');
    let word_count = q.split_whitespace().count();

    if is_quoted || word_count <= 2 {
        return QueryProfile::ExactLookup;
    }
    if HOW_TO_MARKERS.iter().any(|m| q.contains(m)) {
        return QueryProfile::SemanticHowTo;
    }
    if RECALL_MARKERS.iter().any(|m| q.contains(m)) {
        return QueryProfile::SemanticRecall;
    }
    QueryProfile::Mixed
}

impl QueryProfile {
    pub fn weights(self) -> ProfileWeights {
        match self {
            QueryProfile::ExactLookup => ProfileWeights {
                w_fts: 0.8,
                w_vec: 0.2,
                candidate_multiplier: 3,
            },
            QueryProfile::SemanticHowTo => ProfileWeights {
                w_fts: 0.35,
                w_vec: 0.65,
                candidate_multiplier: 4,
            },
            QueryProfile::SemanticRecall => ProfileWeights {
                w_fts: 0.3,
                w_vec: 0.7,
                candidate_multiplier: 4,
            },
            QueryProfile::Mixed => ProfileWeights {
                w_fts: 0.5,
                w_vec: 0.5,
                candidate_multiplier: 3,
            },
        }
    }

    /// Layer-dependent multiplicative boost keyed on this profile (§4.2 step 8).
    pub fn layer_boost(self, layer: Option<relay_store::Layer>) -> f32 {
        use relay_store::Layer::*;
        match (self, layer) {
            (_, Some(UserModel)) => 0.5,
            (QueryProfile::SemanticHowTo, Some(Procedural)) => 1.2,
            (QueryProfile::SemanticHowTo, Some(Semantic)) => 1.0,
            (QueryProfile::SemanticRecall, Some(Episodic)) => 1.15,
            (_, Some(Procedural)) => 1.05,
            _ => 1.0,
        }
    }
}

/// Bounded posterior shift: move priors toward the stronger source by at
/// most `MAX_SHIFT`, keeping both weights within a safety envelope (§4.2 step 5).
const MAX_SHIFT: f32 = 0.2;
const MIN_WEIGHT: f32 = 0.15;

pub fn posterior_correct(
    weights: ProfileWeights,
    mean_fts_score: f32,
    mean_vec_score: f32,
) -> ProfileWeights {
    let diff = mean_vec_score - mean_fts_score;
    if diff.abs() < 0.1 {
        return weights;
    }
    let shift = diff.signum() * MAX_SHIFT.min(diff.abs());
    let w_vec = (weights.w_vec + shift).clamp(MIN_WEIGHT, 1.0 - MIN_WEIGHT);
    let w_fts = 1.0 - w_vec;
    ProfileWeights {
        w_fts,
        w_vec,
        candidate_multiplier: weights.candidate_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_query_is_exact_lookup() {
        assert_eq!(classify("deploy"), QueryProfile::ExactLookup);
    }

    #[test]
    fn how_to_query_is_semantic_how_to() {
        assert_eq!(
            classify("how to deploy when build fails"),
            QueryProfile::SemanticHowTo
        );
    }

    #[test]
    fn recall_query_is_semantic_recall() {
        assert_eq!(
            classify("what did I say about the release"),
            QueryProfile::SemanticRecall
        );
    }

    #[test]
    fn weights_sum_to_one() {
        for profile in [
            QueryProfile::ExactLookup,
            QueryProfile::SemanticHowTo,
            QueryProfile::SemanticRecall,
            QueryProfile::Mixed,
        ] {
            let w = profile.weights();
            assert!((w.w_fts + w.w_vec - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn posterior_correction_shifts_toward_stronger_vector_signal() {
        let base = QueryProfile::Mixed.weights();
        let corrected = posterior_correct(base, 0.2, 0.9);
        assert!(corrected.w_vec > base.w_vec);
        assert!((corrected.w_fts + corrected.w_vec - 1.0).abs() < 1e-6);
    }

    #[test]
    fn posterior_correction_is_noop_when_sources_are_close() {
        let base = QueryProfile::Mixed.weights();
        let corrected = posterior_correct(base, 0.5, 0.52);
        assert_eq!(corrected.w_vec, base.w_vec);
    }

    #[test]
    fn user_model_layer_always_gets_half_weight_boost() {
        assert_eq!(
            QueryProfile::SemanticHowTo.layer_boost(Some(relay_store::Layer::UserModel)),
            0.5
        );
    }
}
