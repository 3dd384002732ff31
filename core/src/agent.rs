//! External agent seam: anything that can answer a prompt.
//!
//! The compiler's advisor and the config-change proposer both go through
//! [`AgentRunner`] so the crate never talks to a model endpoint directly.
//! Tests plug in scripted runners; a deployment wires a real backend.

use std::sync::OnceLock;

use jsonschema::Draft;
use jsonschema::JSONSchema;
use regex_lite::Regex;
use serde_json::Value;

use crate::error::AtForgeError;
use crate::error::Result;

pub trait AgentRunner {
    /// Free-form generation. Implementations should return the raw model
    /// text; callers decide how to interpret it.
    fn generate_text(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Generation that must yield a JSON object. The default implementation
    /// parses the text reply, accepting a fenced ```json block as fallback.
    fn generate_structured(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let raw = self.generate_text(system_prompt, user_prompt)?;
        extract_json_block(&raw)
    }
}

/// Runner used when no agent backend is configured. Every call fails with
/// [`AtForgeError::AgentUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAgentRunner;

impl AgentRunner for NullAgentRunner {
    fn generate_text(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Err(AtForgeError::agent_unavailable(
            "no agent runner configured",
        ))
    }
}

/// Parse a model reply as JSON, tolerating a Markdown code fence around it.
pub fn extract_json_block(text: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE_RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap();
        re
    });
    if let Some(caps) = re.captures(text)
        && let Some(inner) = caps.get(1)
        && let Ok(value) = serde_json::from_str(inner.as_str().trim())
    {
        return Ok(value);
    }
    Err(AtForgeError::schema_validation(
        "no valid JSON found in agent output",
    ))
}

/// Validate `instance` against a Draft-7 schema, joining all violations
/// into one diagnostic.
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<()> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| AtForgeError::schema_validation(format!("schema compile failed: {e}")))?;
    if let Err(violations) = compiled.validate(instance) {
        let detail = violations
            .map(|e| format!("{e} at {}", e.instance_path))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AtForgeError::schema_validation(detail));
    }
    Ok(())
}
