use relay_store::Layer;

/// Per-layer decay rate λ (§4.3). `None` (legacy) is treated as semantic.
pub fn lambda_for(layer: Option<Layer>) -> f64 {
    match layer {
        Some(Layer::UserModel) => 0.0,
        Some(Layer::Procedural) => 0.005,
        Some(Layer::Semantic) | None => 0.01,
        Some(Layer::Episodic) => 0.01,
    }
}

/// `decay = clamp(recency * accessFactor, 0, 1)` (§4.3). `user_model` is fixed
/// at 1.0 always — the access factor never applies to it, since §3/§8 require
/// `decay == 1.0` at that layer regardless of access history.
pub fn decay_score(layer: Option<Layer>, days_since_updated: f64, access_count: i64) -> f64 {
    if matches!(layer, Some(Layer::UserModel)) {
        return 1.0;
    }
    let lambda = lambda_for(layer);
    let recency = (-lambda * days_since_updated.max(0.0)).exp();
    let access_factor = (0.5 + 0.05 * access_count as f64).min(1.0);
    (recency * access_factor).clamp(0.0, 1.0)
}

/// Small recency boost added during fusion: `<= 0.05 * max(0, 1 - days/365)`.
pub fn recency_boost(days_since_created: f64) -> f32 {
    (0.05 * (1.0 - days_since_created / 365.0).max(0.0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_model_never_decays() {
        // Neither age nor access count move the score off 1.0.
        let score_zero_access = decay_score(Some(Layer::UserModel), 10_000.0, 0);
        assert!((score_zero_access - 1.0).abs() < 1e-9);
        let score_saturated = decay_score(Some(Layer::UserModel), 10_000.0, 10);
        assert!((score_saturated - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_access_gives_half_access_factor() {
        let score = decay_score(Some(Layer::Semantic), 0.0, 0);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ten_accesses_saturate_access_factor() {
        let score = decay_score(Some(Layer::Semantic), 0.0, 10);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn legacy_layer_decays_like_semantic() {
        assert_eq!(lambda_for(None), lambda_for(Some(Layer::Semantic)));
    }

    #[test]
    fn recency_boost_fades_to_zero_after_a_year() {
        assert_eq!(recency_boost(400.0), 0.0);
        assert!(recency_boost(0.0) > 0.0);
    }
}
