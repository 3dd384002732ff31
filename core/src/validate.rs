//! Structural validation for the two user-mutated config layers.
//!
//! Intentionally shallow: shapes and required identity fields only. Unknown
//! fields pass through so vendor documents can carry extra data; deep
//! referential checks happen at compile time where missing ids turn into
//! report diagnostics rather than hard errors.

use serde_json::Value;

use crate::docs::id_of;
use crate::error::AtForgeError;
use crate::error::Result;

const POLICY_LISTS: [&str; 2] = ["must_have_capabilities", "allowed_missing_capabilities"];
const SCOPE_LISTS: [&str; 4] = [
    "enable_capabilities",
    "disable_capabilities",
    "enable_commands",
    "disable_commands",
];

/// Field present with a real value, i.e. not absent and not `null`.
fn present<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    doc.get(key).filter(|v| !v.is_null())
}

pub fn validate_manifest(doc: &Value) -> Result<()> {
    if !doc.is_object() {
        return Err(AtForgeError::manifest_invalid("manifest must be object"));
    }
    if doc
        .get("baseline")
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
    {
        return Err(AtForgeError::manifest_invalid(
            "manifest.baseline must be non-empty string",
        ));
    }
    if let Some(extensions) = present(doc, "extensions")
        && !extensions.is_array()
    {
        return Err(AtForgeError::manifest_invalid(
            "manifest.extensions must be array",
        ));
    }
    if let Some(policy) = present(doc, "policy") {
        if !policy.is_object() {
            return Err(AtForgeError::manifest_invalid(
                "manifest.policy must be object",
            ));
        }
        for key in POLICY_LISTS {
            if let Some(field) = present(policy, key)
                && !field.is_array()
            {
                return Err(AtForgeError::manifest_invalid(format!(
                    "manifest.policy.{key} must be array"
                )));
            }
        }
    }
    if let Some(scope) = present(doc, "test_scope") {
        if !scope.is_object() {
            return Err(AtForgeError::manifest_invalid(
                "manifest.test_scope must be object",
            ));
        }
        for key in SCOPE_LISTS {
            if let Some(field) = present(scope, key)
                && !field.is_array()
            {
                return Err(AtForgeError::manifest_invalid(format!(
                    "manifest.test_scope.{key} must be array"
                )));
            }
        }
    }
    if let Some(env) = present(doc, "env")
        && !env.is_object()
    {
        return Err(AtForgeError::manifest_invalid("manifest.env must be object"));
    }
    Ok(())
}

pub fn validate_extension(doc: &Value) -> Result<()> {
    if !doc.is_object() {
        return Err(AtForgeError::extension_invalid("extension must be object"));
    }
    let meta = present(doc, "meta");
    if let Some(meta) = meta
        && !meta.is_object()
    {
        return Err(AtForgeError::extension_invalid(
            "extension.meta must be object",
        ));
    }
    if meta
        .and_then(|m| m.get("id"))
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
    {
        return Err(AtForgeError::extension_invalid(
            "extension.meta.id must be non-empty string",
        ));
    }
    if meta
        .and_then(|m| m.get("version"))
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
    {
        return Err(AtForgeError::extension_invalid(
            "extension.meta.version must be non-empty string",
        ));
    }

    if let Some(caps) = present(doc, "capabilities") {
        let Some(entries) = caps.as_array() else {
            return Err(AtForgeError::extension_invalid(
                "extension.capabilities must be array",
            ));
        };
        for (i, cap) in entries.iter().enumerate() {
            if !cap.is_object() || id_of(cap).is_empty() {
                return Err(AtForgeError::extension_invalid(format!(
                    "extension.capabilities[{i}] invalid"
                )));
            }
        }
    }

    if let Some(cmds) = present(doc, "commands") {
        let Some(entries) = cmds.as_array() else {
            return Err(AtForgeError::extension_invalid(
                "extension.commands must be array",
            ));
        };
        for (i, cmd) in entries.iter().enumerate() {
            if !cmd.is_object() || id_of(cmd).is_empty() {
                return Err(AtForgeError::extension_invalid(format!(
                    "extension.commands[{i}] missing id"
                )));
            }
            if let Some(forms) = present(cmd, "forms")
                && !forms.is_object()
            {
                return Err(AtForgeError::extension_invalid(format!(
                    "extension.commands[{i}].forms must be object"
                )));
            }
            if let Some(responses) = present(cmd, "responses")
                && !responses.is_object()
            {
                return Err(AtForgeError::extension_invalid(format!(
                    "extension.commands[{i}].responses must be object"
                )));
            }
        }
    }
    Ok(())
}
