use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tiergate_core::Params;

/// Collapse whitespace runs in top-level string inputs and trim them
///
/// Non-string values are passed through unchanged, including strings nested
/// inside arrays or objects.
pub fn normalize_inputs(inputs: &Params) -> Params {
    inputs
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => Value::String(text.split_whitespace().collect::<Vec<_>>().join(" ")),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Compute the cache key for a (signature, inputs, backend) triple
///
/// Hashes the canonical JSON form, with object keys sorted at every level,
/// so key order in the caller's inputs never changes the result.
pub fn compute_cache_key(signature: &str, inputs: &Params, backend_id: &str) -> String {
    let payload = canonical(&json!({
        "signature": signature,
        "inputs": Value::Object(normalize_inputs(inputs)),
        "backend": backend_id,
    }));

    let json = serde_json::to_string(&payload).unwrap_or_default();
    let hash = Sha256::digest(json.as_bytes());
    format!("{hash:x}")
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
