use relay_store::Layer;

const USER_MODEL_MARKERS: &[&str] = &["user prefers", "ผู้ใช้ชอบ", "user expertise"];
const PROCEDURAL_MARKERS: &[&str] = &["when ", "ถ้า"];

/// Route an untagged `learn` call to a layer by content shape (§4.3
/// Learning router). An explicit `memory:<layer>` tag in `content` always
/// wins; the caller may always override by passing `Some(layer)` directly.
pub fn route(content: &str) -> Layer {
    if let Some(tag) = extract_memory_tag(content) {
        return tag;
    }

    let lowered = content.to_lowercase();
    if USER_MODEL_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Layer::UserModel;
    }
    if PROCEDURAL_MARKERS.iter().any(|m| lowered.contains(m)) && lowered.contains("then") {
        return Layer::Procedural;
    }
    if lowered.contains("ถ้า") && lowered.contains("ให้") {
        return Layer::Procedural;
    }

    Layer::Semantic
}

fn extract_memory_tag(content: &str) -> Option<Layer> {
    let idx = content.find("memory:")?;
    let rest = &content[idx + "memory:".len()..];
    let tag: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    tag.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_tag_wins_over_content_shape() {
        assert_eq!(route("memory:procedural user prefers dark mode"), Layer::Procedural);
    }

    #[test]
    fn user_prefers_routes_to_user_model() {
        assert_eq!(route("The user prefers terse replies."), Layer::UserModel);
    }

    #[test]
    fn when_then_routes_to_procedural() {
        assert_eq!(route("When the build fails, then run clean install."), Layer::Procedural);
    }

    #[test]
    fn thai_conditional_routes_to_procedural() {
        assert_eq!(route("ถ้าการสร้างล้มเหลว ให้รันล้างข้อมูล"), Layer::Procedural);
    }

    #[test]
    fn default_is_semantic() {
        assert_eq!(route("Docker compose handles multi-container apps."), Layer::Semantic);
    }
}
