//! Tolerant accessors over loose JSON documents.
//!
//! Source documents are user-edited files; the compile path treats a
//! missing or type-mismatched optional field as its zero value instead of
//! failing. These helpers centralize that policy.

use serde_json::Value;

/// Field as an array slice; missing or mistyped → empty.
pub(crate) fn field_array<'a>(doc: &'a Value, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String form of a loose scalar: strings bare, numbers/bools via their
/// JSON rendering, everything else empty.
pub(crate) fn loose_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => v.to_string(),
        _ => String::new(),
    }
}

/// Entry id, loosely stringified; `""` marks "no usable id".
pub(crate) fn id_of(entry: &Value) -> String {
    entry.get("id").map(loose_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn mistyped_fields_become_zero_values() {
        let doc = json!({"capabilities": "oops", "meta": 3});
        assert!(field_array(&doc, "capabilities").is_empty());
        assert!(field_array(&doc, "absent").is_empty());
    }

    #[test]
    fn loose_string_renders_scalars() {
        assert_eq!(loose_string(&json!("sms.core")), "sms.core");
        assert_eq!(loose_string(&json!(7)), "7");
        assert_eq!(loose_string(&json!(true)), "true");
        assert_eq!(loose_string(&json!(null)), "");
        assert_eq!(loose_string(&json!({"a": 1})), "");
    }

    #[test]
    fn id_of_handles_odd_shapes() {
        assert_eq!(id_of(&json!({"id": "cmd.cfun"})), "cmd.cfun");
        assert_eq!(id_of(&json!({"id": 5})), "5");
        assert_eq!(id_of(&json!({"desc": "no id"})), "");
        assert_eq!(id_of(&json!("scalar")), "");
    }
}
