// [libs/core/btfi-crypto/src/canon.rs]
/*!
 * =================================================================
 * APARATO: CANONICAL SERIALIZER (V1.0)
 * CLASIFICACIÓN: CORE CRYPTOGRAPHY (ESTRATO L1)
 * RESPONSABILIDAD: FORMA DETERMINISTA DE BYTES PARA HASH Y FIRMA
 *
 * `serde_json::Map` ya ordena sus claves (BTreeMap por defecto, sin el
 * feature `preserve_order`), de modo que `serde_json::to_vec` sobre un
 * `Value` ya produce claves ordenadas en cada nivel del objeto. Esta
 * función existe para documentar y fijar ese invariante en un único
 * punto de conversión — si algún día el workspace activa
 * `preserve_order`, esta función es la que rompe, no cien call-sites.
 * =================================================================
 */

use btfi_models::error::CoreError;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let json_value = serde_json::to_value(value)
        .map_err(|e| CoreError::Canonicalization(format!("serialize to value: {e}")))?;
    assert_sorted(&json_value);
    serde_json::to_vec(&json_value)
        .map_err(|e| CoreError::Canonicalization(format!("serialize to bytes: {e}")))
}

/// Elimina recursivamente las claves con prefijo `_` de un documento,
/// requerido antes de calcular el hash de una hoja del Merkle tree
/// (spec.md §4.7 paso 2).
pub fn strip_underscore_prefixed(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned = map
                .into_iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k, strip_underscore_prefixed(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(strip_underscore_prefixed).collect())
        }
        other => other,
    }
}

pub fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256_bytes(bytes))
}

/// Debug-only invariant check: every object in the tree has keys in
/// ascending order. Cheap relative to serialization; skipped in release.
fn assert_sorted(value: &Value) {
    if !cfg!(debug_assertions) {
        return;
    }
    match value {
        Value::Object(map) => {
            let keys: Vec<&String> = map.keys().collect();
            let mut sorted = keys.clone();
            sorted.sort();
            debug_assert_eq!(keys, sorted, "canonical map keys out of order");
            for v in map.values() {
                assert_sorted(v);
            }
        }
        Value::Array(items) => items.iter().for_each(assert_sorted),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sort_object_keys() {
        let value = json!({"b": 1, "a": 2, "c": {"z": 1, "a": 2}});
        let bytes = to_canonical_bytes(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"a":2,"b":1,"c":{"a":2,"z":1}}"#);
    }

    #[test]
    fn strip_underscore_prefixed_removes_only_matching_keys() {
        let value = json!({"a": 1, "_b": 2, "nested": {"_x": 1, "y": 2}});
        let cleaned = strip_underscore_prefixed(value);
        assert_eq!(cleaned, json!({"a": 1, "nested": {"y": 2}}));
    }

    #[test]
    fn empty_bytes_hash_matches_known_sha256() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
