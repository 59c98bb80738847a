use serde_json::{Map, Value};

/// Deep-merge `patch` into `base`: arrays are replaced wholesale, nested
/// objects are merged key-by-key, `Value::Null` fields are written
/// (explicit clears), and keys simply absent from `patch` are left alone
/// (§4.3 user_model upsert).
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) if patch_value.is_object() && existing.is_object() => {
                        deep_merge(existing, patch_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

/// Merge `new_steps` into `existing_steps`, deduplicating while preserving
/// first-seen order (§4.3 procedural merge).
pub fn merge_steps(existing_steps: &[String], new_steps: &[String]) -> Vec<String> {
    let mut merged = existing_steps.to_vec();
    for step in new_steps {
        if !merged.contains(step) {
            merged.push(step.clone());
        }
    }
    merged
}

/// Build an empty object envelope — the starting point for a brand new
/// user_model document.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_nested_objects() {
        let mut base = json!({"prefs": {"theme": "dark", "lang": "en"}});
        let patch = json!({"prefs": {"lang": "th"}});
        deep_merge(&mut base, &patch);
        assert_eq!(base, json!({"prefs": {"theme": "dark", "lang": "th"}}));
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let mut base = json!({"tags": ["a", "b"]});
        let patch = json!({"tags": ["c"]});
        deep_merge(&mut base, &patch);
        assert_eq!(base, json!({"tags": ["c"]}));
    }

    #[test]
    fn deep_merge_writes_explicit_null() {
        let mut base = json!({"nickname": "bob"});
        let patch = json!({"nickname": null});
        deep_merge(&mut base, &patch);
        assert_eq!(base, json!({"nickname": null}));
    }

    #[test]
    fn deep_merge_skips_keys_absent_from_patch() {
        let mut base = json!({"a": 1, "b": 2});
        let patch = json!({"a": 9});
        deep_merge(&mut base, &patch);
        assert_eq!(base, json!({"a": 9, "b": 2}));
    }

    #[test]
    fn merge_steps_deduplicates_preserving_order() {
        let existing = vec!["clean".to_string(), "build".to_string()];
        let new = vec!["build".to_string(), "deploy".to_string()];
        let merged = merge_steps(&existing, &new);
        assert_eq!(merged, vec!["clean", "build", "deploy"]);
    }
}
