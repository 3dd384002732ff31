//! Additive, id-guarded merge of an extension layer onto a baseline spec.
//!
//! Baseline entries always win: an extension capability or command whose id
//! already exists in the baseline is dropped, never overlaid. Entries
//! without an id (or that are not objects) are ignored on the extension
//! side; whatever the baseline carries stays as-is.

use std::collections::BTreeSet;

use serde_json::Value;
use serde_json::json;

use crate::docs::field_array;
use crate::docs::id_of;

/// Merge `incoming` (extension) into `base` (baseline) and return the
/// combined document. Only `capabilities` and `commands` participate; all
/// other baseline fields pass through untouched. A mistyped section on
/// either side reads as empty.
pub fn merge_spec(base: &Value, incoming: &Value) -> Value {
    let mut out = if base.is_object() {
        base.clone()
    } else {
        json!({})
    };
    for section in ["capabilities", "commands"] {
        let merged = merge_section(&out, incoming, section);
        if let Some(map) = out.as_object_mut() {
            map.insert(section.to_string(), Value::Array(merged));
        }
    }
    out
}

fn merge_section(base: &Value, incoming: &Value, section: &str) -> Vec<Value> {
    let mut merged: Vec<Value> = field_array(base, section).to_vec();
    let mut seen: BTreeSet<String> = merged
        .iter()
        .filter(|entry| entry.is_object())
        .map(id_of)
        .filter(|id| !id.is_empty())
        .collect();
    for entry in field_array(incoming, section) {
        if !entry.is_object() {
            continue;
        }
        let id = id_of(entry);
        if id.is_empty() || seen.contains(&id) {
            continue;
        }
        merged.push(entry.clone());
        seen.insert(id);
    }
    merged
}
