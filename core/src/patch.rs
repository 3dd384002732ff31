//! RFC 6902-style patch application (add/remove/replace/test) on top of
//! the pointer module.
//!
//! Patches arrive as untyped JSON from config-agent candidates, so parsing
//! is a separate, validating step. Application is atomic: ops run against a
//! copy and the first failure aborts the whole patch, leaving the caller's
//! document untouched.

use serde_json::Value;

use atforge_protocol::PatchKind;
use atforge_protocol::PatchOp;

use crate::docs::loose_string;
use crate::error::AtForgeError;
use crate::error::Result;
use crate::pointer;

/// Validate and type a raw candidate patch.
pub fn parse_patch(raw: &Value) -> Result<Vec<PatchOp>> {
    let Some(items) = raw.as_array() else {
        return Err(AtForgeError::invalid_patch("patch must be an array"));
    };
    let mut ops = Vec::with_capacity(items.len());
    for item in items {
        let Some(fields) = item.as_object() else {
            return Err(AtForgeError::invalid_patch("patch op must be an object"));
        };
        let kind_text = fields
            .get("op")
            .map(loose_string)
            .unwrap_or_default()
            .trim()
            .to_string();
        let Some(op) = PatchKind::parse(&kind_text) else {
            return Err(AtForgeError::invalid_patch(format!(
                "unsupported patch op: {kind_text}"
            )));
        };
        let path = fields
            .get("path")
            .map(loose_string)
            .unwrap_or_default()
            .trim()
            .to_string();
        ops.push(PatchOp {
            op,
            path,
            value: fields.get("value").cloned(),
        });
    }
    Ok(ops)
}

/// Apply `ops` in order against a copy of `doc`. Any failing op surfaces
/// its pointer error and no partial result escapes.
pub fn apply_patch(doc: &Value, ops: &[PatchOp]) -> Result<Value> {
    let mut out = doc.clone();
    for op in ops {
        match op.op {
            PatchKind::Add => {
                let value = op.value.clone().unwrap_or(Value::Null);
                pointer::set_in_place(&mut out, &op.path, value, false)?;
            }
            PatchKind::Replace => {
                pointer::get(&out, &op.path)?;
                let value = op.value.clone().unwrap_or(Value::Null);
                pointer::set_in_place(&mut out, &op.path, value, false)?;
            }
            PatchKind::Remove => {
                pointer::remove_in_place(&mut out, &op.path)?;
            }
            PatchKind::Test => {
                let current = pointer::get(&out, &op.path)?;
                let expected = op.value.clone().unwrap_or(Value::Null);
                if *current != expected {
                    return Err(AtForgeError::test_failed(&op.path));
                }
            }
        }
    }
    Ok(out)
}

/// Parse and apply an untyped patch in one step.
pub fn apply_raw_patch(doc: &Value, raw: &Value) -> Result<Value> {
    let ops = parse_patch(raw)?;
    apply_patch(doc, &ops)
}
