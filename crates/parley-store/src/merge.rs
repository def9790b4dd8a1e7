//! Recursive deep merge for `update` patches.

use serde_json::Value;

/// Deep-merge `patch` over `target`.
///
/// - Objects are merged recursively (patch overrides target per-key)
/// - Arrays and primitives are replaced entirely by the patch
/// - Null values in the patch are skipped (preserving the target)
pub fn deep_merge(target: Value, patch: Value) -> Value {
    match (target, patch) {
        (Value::Object(mut target_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, patch_val)
                } else {
                    patch_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, patch) => patch,
    }
}
