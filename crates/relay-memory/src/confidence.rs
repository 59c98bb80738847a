/// Origin-derived confidence for a new semantic document (§4.3).
///
/// Values are stored on the 0..100 integer scale (see `relay_core::scale`).
/// `origin` ranks by provenance trust (`human` highest); `source` is
/// inspected for a correction/fix marker or an embedded URL, either of
/// which overrides the origin-based default.
pub fn semantic_confidence(origin: &str, source_path: Option<&str>) -> u8 {
    let source = source_path.unwrap_or("");
    let lowered = source.to_lowercase();

    if lowered.contains("correction") || lowered.contains("fix") {
        return 85;
    }
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return 80;
    }

    match origin {
        "human" => 90,
        "mother" => 75,
        "agent" => 65,
        _ => 60,
    }
}

/// Bump procedural confidence upward on successful use, capped at 100
/// (§4.3 "bumps confidence upward (capped)").
pub fn bump_procedural_confidence(current: u8, step: u8) -> u8 {
    current.saturating_add(step).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_origin_outranks_default() {
        assert!(semantic_confidence("human", None) > semantic_confidence("unknown", None));
    }

    #[test]
    fn correction_marker_overrides_origin() {
        assert_eq!(semantic_confidence("agent", Some("correction-note.md")), 85);
    }

    #[test]
    fn url_source_yields_eighty() {
        assert_eq!(semantic_confidence("agent", Some("https://example.com/doc")), 80);
    }

    #[test]
    fn default_origin_is_sixty() {
        assert_eq!(semantic_confidence("unspecified", None), 60);
    }

    #[test]
    fn procedural_confidence_bump_caps_at_hundred() {
        assert_eq!(bump_procedural_confidence(95, 10), 100);
    }
}
