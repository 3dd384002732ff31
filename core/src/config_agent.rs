//! Config-change proposals: turn a free-text request into validated new
//! manifest/extension documents.
//!
//! Each attempt takes a candidate `{change_spec, manifest_patch,
//! extension_mode, extension_patch|extension_file}` (from the agent
//! runner, or a neutral no-op when the agent is disabled), applies it,
//! runs the keyword normalizer over the manifest, and structurally
//! validates both results. Validation failures loop back into the next
//! prompt as an error hint, bounded by `max_attempts`. Nothing here writes
//! to the store; callers persist the proposal if they want it.

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::warn;

use crate::agent::AgentRunner;
use crate::agent::validate_against_schema;
use crate::docs::loose_string;
use crate::error::AtForgeError;
use crate::error::Result;
use crate::patch::apply_raw_patch;
use crate::validate::validate_extension;
use crate::validate::validate_manifest;

const PATCH_BOT_SYSTEM_PROMPT: &str = "You are ConfigPatchBot. Return only strict JSON object. \
     Generate ChangeSpec + JSON Patch + Extension update draft.";

/// Validated outcome of a config-change request.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigProposal {
    pub change_spec: Value,
    pub manifest_patch: Value,
    pub extension_mode: String,
    pub extension_patch: Value,
    pub manifest_new: Value,
    pub extension_new: Value,
    pub attempts: u32,
}

/// Shape gate for agent candidates. Loose on purpose: unknown fields pass,
/// and `extension_mode` is any string because non-`patch` values mean
/// `replace`.
fn candidate_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "change_spec": {"type": "object"},
            "manifest_patch": {"type": "array", "items": {"type": "object"}},
            "extension_mode": {"type": "string"},
            "extension_patch": {"type": "array", "items": {"type": "object"}},
            "extension_file": {"type": "object"},
        },
        "additionalProperties": true,
    })
}

/// Candidate used when the agent runner is disabled: no manifest changes,
/// extension replaced by itself. The keyword normalizer still runs, so a
/// request like "disable sms" takes effect without any agent.
fn no_op_candidate(extension: &Value) -> Value {
    json!({
        "change_spec": {
            "manifest_changes": {
                "disable_capabilities": [],
                "disable_commands": [],
                "add_extensions": [],
                "env_set": {},
            },
            "extension_requests": [],
        },
        "manifest_patch": [],
        "extension_mode": "replace",
        "extension_file": extension,
    })
}

/// Prompt payload: current documents, the output contract, and the error
/// hint from the previous attempt (empty on the first).
fn build_prompt(
    request_text: &str,
    manifest: &Value,
    extension: &Value,
    error_hint: &str,
) -> String {
    let payload = json!({
        "user_request": request_text,
        "current_manifest": manifest,
        "current_extension": extension,
        "output_contract": {
            "change_spec": {
                "manifest_changes": {
                    "disable_capabilities": ["string"],
                    "disable_commands": ["string"],
                    "add_extensions": ["string"],
                    "env_set": {"key": "value"},
                },
                "extension_requests": [
                    {"vendor": "string", "capability": "string", "command_id": "string"},
                ],
            },
            "manifest_patch": [{"op": "add|remove|replace|test", "path": "/json/pointer", "value": "any"}],
            "extension_mode": "replace|patch",
            "extension_patch": [{"op": "add|remove|replace|test", "path": "/json/pointer", "value": "any"}],
            "extension_file": {"meta": {"id": "string", "version": "string"}, "capabilities": [], "commands": []},
        },
        "rules": [
            "Output ONLY JSON object, no markdown.",
            "Do not remove baseline or existing extensions unless user explicitly asks.",
            "Use minimal patch, avoid unrelated changes.",
            "If extension changes are needed, prefer extension_mode='replace' with full valid extension_file.",
        ],
        "error_hint_from_previous_attempt": error_hint,
    });
    payload.to_string()
}

const CS_REG_KEYWORDS: [&str; 5] = [
    "net.registration.cs",
    "cs注册",
    "creg",
    "+creg",
    "cs registration",
];
const CALL_KEYWORDS: [&str; 5] = ["cs语音", "语音", "通话", "voice", "call"];
const SMS_KEYWORDS: [&str; 2] = ["sms", "短信"];

/// Request-text-driven cleanup of `test_scope.disable_capabilities`.
///
/// Deduplicates the list, drops `net.registration.cs` unless the request
/// explicitly mentions CS registration, and adds `cs.call.basic` /
/// `sms.basic` when voice/SMS keywords appear. Keyword matching is
/// case-insensitive substring search.
pub fn normalize_manifest_by_request(manifest: &Value, request_text: &str) -> Value {
    let mut out = if manifest.is_object() {
        manifest.clone()
    } else {
        json!({})
    };
    let scope_ok = out.get("test_scope").is_some_and(Value::is_object);
    if !scope_ok
        && let Some(map) = out.as_object_mut()
    {
        map.insert("test_scope".to_string(), json!({}));
    }

    let raw_list: Vec<Value> = out
        .get("test_scope")
        .and_then(|scope| scope.get("disable_capabilities"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut normalized: Vec<String> = Vec::new();
    for entry in &raw_list {
        let text = loose_string(entry).trim().to_string();
        if text.is_empty() || normalized.contains(&text) {
            continue;
        }
        normalized.push(text);
    }

    let request = request_text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| request.contains(k));

    if !mentions(&CS_REG_KEYWORDS) {
        normalized.retain(|cap| cap != "net.registration.cs");
    }
    if mentions(&CALL_KEYWORDS) && !normalized.iter().any(|cap| cap == "cs.call.basic") {
        normalized.push("cs.call.basic".to_string());
    }
    if mentions(&SMS_KEYWORDS)
        && !normalized
            .iter()
            .any(|cap| cap == "sms.basic" || cap == "sms.core")
    {
        normalized.push("sms.basic".to_string());
    }

    if let Some(scope) = out.get_mut("test_scope").and_then(Value::as_object_mut) {
        scope.insert("disable_capabilities".to_string(), json!(normalized));
    }
    out
}

/// Run the bounded propose/validate loop. Agent transport failures abort
/// immediately; only candidate-quality failures are retried.
pub fn propose_config_change(
    runner: &dyn AgentRunner,
    manifest: &Value,
    extension: &Value,
    request_text: &str,
    use_llm: bool,
    max_attempts: u32,
) -> Result<ConfigProposal> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let candidate = if use_llm {
            let prompt = build_prompt(request_text, manifest, extension, &last_error);
            runner.generate_structured(PATCH_BOT_SYSTEM_PROMPT, &prompt)?
        } else {
            no_op_candidate(extension)
        };

        match evaluate_candidate(&candidate, manifest, extension, request_text) {
            Ok(mut proposal) => {
                proposal.attempts = attempt;
                debug!("config proposal accepted on attempt {attempt}");
                return Ok(proposal);
            }
            Err(err) if err.is_retryable_validation() => {
                warn!("config candidate rejected on attempt {attempt}: {err}");
                last_error = err.to_string();
            }
            Err(err) => return Err(err),
        }
    }

    Err(AtForgeError::ConfigCompileFailed {
        attempts: max_attempts,
        last_error,
    })
}

fn evaluate_candidate(
    candidate: &Value,
    manifest: &Value,
    extension: &Value,
    request_text: &str,
) -> Result<ConfigProposal> {
    validate_against_schema(&candidate_schema(), candidate)?;

    let manifest_patch = candidate
        .get("manifest_patch")
        .cloned()
        .unwrap_or_else(|| json!([]));
    if !manifest_patch.is_array() {
        return Err(AtForgeError::invalid_patch("manifest_patch must be array"));
    }
    let patched = if manifest_patch.as_array().is_some_and(|ops| !ops.is_empty()) {
        apply_raw_patch(manifest, &manifest_patch)?
    } else {
        manifest.clone()
    };
    let manifest_new = normalize_manifest_by_request(&patched, request_text);

    let extension_mode = candidate
        .get("extension_mode")
        .map(loose_string)
        .unwrap_or_else(|| "replace".to_string());
    let extension_patch = candidate
        .get("extension_patch")
        .cloned()
        .unwrap_or_else(|| json!([]));
    let extension_new = if extension_mode == "patch" {
        if !extension_patch.is_array() {
            return Err(AtForgeError::invalid_patch("extension_patch must be array"));
        }
        if extension_patch.as_array().is_some_and(|ops| !ops.is_empty()) {
            apply_raw_patch(extension, &extension_patch)?
        } else {
            extension.clone()
        }
    } else {
        candidate
            .get("extension_file")
            .cloned()
            .unwrap_or_else(|| extension.clone())
    };

    validate_manifest(&manifest_new)?;
    validate_extension(&extension_new)?;

    Ok(ConfigProposal {
        change_spec: candidate
            .get("change_spec")
            .cloned()
            .unwrap_or_else(|| json!({})),
        manifest_patch,
        extension_mode,
        extension_patch,
        manifest_new,
        extension_new,
        attempts: 0,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::cell::RefCell;
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct ScriptedRunner {
        replies: RefCell<VecDeque<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: RefCell::new(replies.iter().map(|s| (*s).to_string()).collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl AgentRunner for ScriptedRunner {
        fn generate_text(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(user_prompt.to_string());
            self.replies
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| AtForgeError::agent_unavailable("script exhausted"))
        }
    }

    fn manifest() -> Value {
        crate::defaults::manifest()
    }

    fn extension() -> Value {
        crate::defaults::vendor_extension()
    }

    #[test]
    fn normalize_dedupes_and_strips_unrequested_cs_reg() {
        let doc = json!({
            "baseline": "atspec.3gpp@0.2",
            "test_scope": {"disable_capabilities": [
                "sms.basic", "sms.basic", " ", "net.registration.cs",
            ]},
        });
        let out = normalize_manifest_by_request(&doc, "disable messaging");
        assert_eq!(
            out["test_scope"]["disable_capabilities"],
            json!(["sms.basic"])
        );

        // Explicit mention keeps the CS registration entry.
        let out = normalize_manifest_by_request(&doc, "disable CREG checks");
        assert_eq!(
            out["test_scope"]["disable_capabilities"],
            json!(["sms.basic", "net.registration.cs"])
        );
    }

    #[test]
    fn normalize_maps_voice_and_sms_keywords() {
        let doc = json!({"baseline": "b", "test_scope": {"disable_capabilities": []}});
        let out = normalize_manifest_by_request(&doc, "请禁用语音通话用例");
        assert_eq!(
            out["test_scope"]["disable_capabilities"],
            json!(["cs.call.basic"])
        );

        let out = normalize_manifest_by_request(&doc, "skip SMS for this run");
        assert_eq!(
            out["test_scope"]["disable_capabilities"],
            json!(["sms.basic"])
        );

        // sms.core already listed: no duplicate sms.basic.
        let doc = json!({"baseline": "b", "test_scope": {"disable_capabilities": ["sms.core"]}});
        let out = normalize_manifest_by_request(&doc, "no sms");
        assert_eq!(
            out["test_scope"]["disable_capabilities"],
            json!(["sms.core"])
        );
    }

    #[test]
    fn normalize_builds_missing_scope() {
        let out = normalize_manifest_by_request(&json!({"baseline": "b"}), "");
        assert_eq!(out["test_scope"]["disable_capabilities"], json!([]));
    }

    #[test]
    fn no_llm_path_applies_normalizer_only() {
        let proposal = propose_config_change(
            &crate::agent::NullAgentRunner,
            &manifest(),
            &extension(),
            "请禁用短信用例",
            false,
            3,
        )
        .unwrap();
        assert_eq!(proposal.attempts, 1);
        assert_eq!(proposal.extension_mode, "replace");
        assert_eq!(proposal.extension_new, extension());
        let disabled = proposal.manifest_new["test_scope"]["disable_capabilities"]
            .as_array()
            .unwrap();
        assert!(disabled.contains(&json!("sms.basic")));
    }

    #[test]
    fn bad_candidate_retries_with_error_hint() {
        let bad = r#"{"manifest_patch": [{"op": "replace", "path": "/nope/missing", "value": 1}], "extension_mode": "replace"}"#;
        let good = r#"{"manifest_patch": [], "extension_mode": "replace"}"#;
        let runner = ScriptedRunner::new(&[bad, good]);

        let proposal = propose_config_change(
            &runner,
            &manifest(),
            &extension(),
            "tweak things",
            true,
            3,
        )
        .unwrap();
        assert_eq!(proposal.attempts, 2);

        let prompts = runner.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("\"error_hint_from_previous_attempt\":\"\""));
        assert!(prompts[1].contains("path not found"));
    }

    #[test]
    fn schema_violation_is_retried() {
        let bad = r#"{"manifest_patch": {"op": "add"}}"#;
        let good = r#"{"manifest_patch": []}"#;
        let runner = ScriptedRunner::new(&[bad, good]);

        let proposal =
            propose_config_change(&runner, &manifest(), &extension(), "x", true, 3).unwrap();
        assert_eq!(proposal.attempts, 2);
    }

    #[test]
    fn exhausted_attempts_surface_last_error() {
        let bad = r#"{"extension_mode": "replace", "extension_file": {"meta": {}}}"#;
        let runner = ScriptedRunner::new(&[bad, bad, bad]);

        let err = propose_config_change(&runner, &manifest(), &extension(), "x", true, 3)
            .unwrap_err();
        match err {
            AtForgeError::ConfigCompileFailed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("extension.meta.id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extension_patch_mode_applies_patch() {
        let candidate = json!({
            "extension_mode": "patch",
            "extension_patch": [
                {"op": "add", "path": "/commands/-", "value": {"id": "vendor.qgps", "at": "AT+QGPS=1"}},
            ],
        });
        let reply = candidate.to_string();
        let runner = ScriptedRunner::new(&[reply.as_str()]);
        let proposal =
            propose_config_change(&runner, &manifest(), &extension(), "add gps", true, 1)
                .unwrap();
        assert_eq!(proposal.extension_mode, "patch");
        assert_eq!(
            proposal.extension_new["commands"][0]["id"],
            json!("vendor.qgps")
        );
    }

    #[test]
    fn agent_transport_failure_aborts_without_retry() {
        let runner = ScriptedRunner::new(&[]);
        let err = propose_config_change(&runner, &manifest(), &extension(), "x", true, 3)
            .unwrap_err();
        assert!(matches!(err, AtForgeError::AgentUnavailable { .. }));
    }
}
