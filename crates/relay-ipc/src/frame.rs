pub const OUTPUT_START: &str = "---OUTPUT_START---";
pub const OUTPUT_END: &str = "---OUTPUT_END---";

/// Extract the framed payload from a raw agent output stream, discarding
/// anything outside the markers as log noise (§4.8).
pub fn extract_framed(raw: &str) -> Option<&str> {
    let start = raw.find(OUTPUT_START)? + OUTPUT_START.len();
    let rest = &raw[start..];
    let end = rest.find(OUTPUT_END)?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_payload_between_markers() {
        let raw = format!("noise before\n{OUTPUT_START}\n{{\"a\":1}}\n{OUTPUT_END}\nnoise after");
        assert_eq!(extract_framed(&raw), Some("{\"a\":1}"));
    }

    #[test]
    fn returns_none_without_markers() {
        assert_eq!(extract_framed("just log output"), None);
    }

    #[test]
    fn returns_none_when_end_marker_missing() {
        let raw = format!("{OUTPUT_START}\n{{\"a\":1}}");
        assert_eq!(extract_framed(&raw), None);
    }
}
