//! Scope compiler: merge baseline + extension, prune by manifest scope,
//! derive the effective profile and active EFSM, and emit a report.
//!
//! The pass is a pure document transformation; the only side effect is
//! writing the four build artifacts through the store. Malformed input
//! fields degrade to empty rather than failing. Diagnostics are the
//! report's job, not errors.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tracing::info;

use atforge_protocol::AdvisorNote;
use atforge_protocol::COMPILER_VERSION;
use atforge_protocol::CompileReport;
use atforge_protocol::CompileStats;
use atforge_protocol::PrunedTransition;

use crate::agent::AgentRunner;
use crate::docs::field_array;
use crate::docs::id_of;
use crate::docs::loose_string;
use crate::error::AtForgeError;
use crate::error::Result;
use crate::merge::merge_spec;
use crate::store::DocumentStore;
use crate::template::command_template;
use crate::template::extract_token;

/// Transition-id substrings that mark a call-family transition for the
/// pruning heuristic.
const CALL_HINTS: [&str; 8] = ["VOICE", "CALL", "DIAL", "CHUP", "ATA", "ATH", "RING", "CLCC"];

/// The four derived artifacts of one compile.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub effective_spec: Value,
    pub effective_profile: Value,
    pub active_efsm: Value,
    pub report: CompileReport,
}

/// Manifest `test_scope` distilled into membership sets.
///
/// `enable_capabilities` acts as an allowlist: `*` means everything, an
/// empty or missing list enables nothing. Disabling a capability disables
/// its whole family (`sms.*`, `cs.call.*`), so a manifest that says
/// `sms.basic` also shuts down `sms.core`.
struct ScopeFilter {
    disable_caps: BTreeSet<String>,
    enable_caps: BTreeSet<String>,
    disable_cmds: BTreeSet<String>,
    enable_cmds: BTreeSet<String>,
    disabled_families: BTreeSet<String>,
    scope_doc: Value,
}

fn cap_family(cap_id: &str) -> String {
    let c = cap_id.to_lowercase();
    if c == "sms.basic" || c == "sms.core" || c.starts_with("sms.") {
        return "sms".to_string();
    }
    if c == "cs.call.basic" || c == "cs.call" || c.starts_with("cs.call.") || c.contains("voice") {
        return "cs.call".to_string();
    }
    c
}

impl ScopeFilter {
    fn from_manifest(manifest: &Value) -> Self {
        let scope_doc = manifest
            .get("test_scope")
            .filter(|s| s.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));

        let string_set = |key: &str| -> BTreeSet<String> {
            field_array(&scope_doc, key).iter().map(loose_string).collect()
        };
        let disable_caps = string_set("disable_capabilities");
        // A mistyped enable list falls open to the wildcard; a missing one
        // stays closed.
        let enable_caps = match scope_doc.get("enable_capabilities") {
            Some(Value::Array(items)) => items.iter().map(loose_string).collect(),
            Some(_) => BTreeSet::from(["*".to_string()]),
            None => BTreeSet::new(),
        };
        let disabled_families = disable_caps.iter().map(|c| cap_family(c)).collect();

        Self {
            disable_caps,
            enable_caps,
            disable_cmds: string_set("disable_commands"),
            enable_cmds: string_set("enable_commands"),
            disabled_families,
            scope_doc,
        }
    }

    fn all_caps_enabled(&self) -> bool {
        self.enable_caps.contains("*")
    }

    fn cap_disabled(&self, cap_id: &str) -> bool {
        self.disable_caps.contains(cap_id)
            || self.disabled_families.contains(&cap_family(cap_id))
    }
}

/// Run the full compile against the store's current documents and persist
/// the build artifacts. `use_llm` gates the advisory pass only; advice can
/// never fail the compile.
pub fn compile_assets(
    store: &DocumentStore,
    runner: &dyn AgentRunner,
    use_llm: bool,
) -> Result<CompileOutput> {
    let baseline = store.load_spec();
    let extension = store.load_extension();
    let profile = store.load_profile();
    let manifest = store.load_manifest();
    let efsm_template = store.load_efsm();

    let scope = ScopeFilter::from_manifest(&manifest);
    let mut effective_spec = merge_spec(&baseline, &extension);

    // ── capabilities ────────────────────────────────────────────────────────

    let raw_caps = field_array(&effective_spec, "capabilities").to_vec();
    let caps_kept: Vec<Value> = raw_caps
        .iter()
        .filter(|cap| {
            if !cap.is_object() {
                return false;
            }
            let id = id_of(cap);
            if scope.all_caps_enabled() {
                !id.is_empty() && !scope.cap_disabled(&id)
            } else {
                scope.enable_caps.contains(&id) && !scope.cap_disabled(&id)
            }
        })
        .cloned()
        .collect();
    let cap_ids_kept: BTreeSet<String> = caps_kept.iter().map(id_of).collect();

    // ── commands ────────────────────────────────────────────────────────────

    let raw_cmds = field_array(&effective_spec, "commands").to_vec();
    let mut cmd_objs: Vec<Value> = Vec::new();
    for cmd in &raw_cmds {
        if !cmd.is_object() {
            continue;
        }
        let cid = id_of(cmd);
        if cid.is_empty() {
            continue;
        }
        if !scope.enable_cmds.is_empty() && !scope.enable_cmds.contains(&cid) {
            continue;
        }
        if scope.disable_cmds.contains(&cid) {
            continue;
        }
        let cap = cmd.get("capability").map(loose_string).unwrap_or_default();
        if !cap.is_empty() && (!cap_ids_kept.contains(&cap) || scope.cap_disabled(&cap)) {
            continue;
        }
        cmd_objs.push(cmd.clone());
    }

    if let Some(map) = effective_spec.as_object_mut() {
        map.insert("capabilities".to_string(), json!(caps_kept));
        map.insert("commands".to_string(), json!(cmd_objs));
    }

    // ── token maps for step-level pruning ───────────────────────────────────

    // Token → owning capability over the whole merged command table,
    // including commands the scope just removed.
    let mut token_to_cap_all: BTreeMap<String, String> = BTreeMap::new();
    for cmd in &raw_cmds {
        if !cmd.is_object() {
            continue;
        }
        let token = extract_token(&command_template(cmd));
        let cap = cmd.get("capability").map(loose_string).unwrap_or_default();
        if !token.is_empty() && !cap.is_empty() {
            token_to_cap_all.insert(token, cap);
        }
    }

    let cmd_ids_enabled: BTreeSet<String> = cmd_objs.iter().map(id_of).collect();
    let mut tokens = TokenIndex {
        to_cap_all: token_to_cap_all,
        to_cap: BTreeMap::new(),
        enabled: BTreeSet::new(),
    };
    for cmd in &cmd_objs {
        let cid = id_of(cmd);
        let cap = cmd.get("capability").map(loose_string).unwrap_or_default();
        let token = extract_token(&command_template(cmd));
        if !token.is_empty() {
            tokens.enabled.insert(token.clone());
            if !cap.is_empty() {
                tokens.to_cap.insert(token, cap.clone());
            }
        }
        // Command ids double as pseudo-tokens for step matching.
        tokens.to_cap.insert(cid.to_uppercase(), cap);
    }

    // ── profile bindings ────────────────────────────────────────────────────

    let mut effective_profile = if profile.is_object() {
        profile
    } else {
        json!({})
    };
    let bindings = field_array(&effective_profile, "bindings").to_vec();
    let mut new_bindings: Vec<Value> = Vec::new();
    for binding in &bindings {
        let Some(fields) = binding.as_object() else {
            continue;
        };
        let cap = fields.get("capability").map(loose_string).unwrap_or_default();
        if !cap.is_empty() && (!cap_ids_kept.contains(&cap) || scope.cap_disabled(&cap)) {
            continue;
        }
        let filtered: Vec<Value> = field_array(binding, "impl")
            .iter()
            .filter(|entry| {
                entry.as_object().is_some_and(|e| {
                    let cmd_id = e.get("cmd_id").map(loose_string).unwrap_or_default();
                    cmd_id.is_empty() || cmd_ids_enabled.contains(&cmd_id)
                })
            })
            .cloned()
            .collect();
        let mut rewritten = fields.clone();
        rewritten.insert("impl".to_string(), json!(filtered));
        new_bindings.push(Value::Object(rewritten));
    }

    let mut capability_support = Map::new();
    for cap in &cap_ids_kept {
        let supported = new_bindings.iter().any(|binding| {
            binding
                .get("capability")
                .map(loose_string)
                .unwrap_or_default()
                == *cap
                && !field_array(binding, "impl").is_empty()
        });
        capability_support.insert(cap.clone(), json!(supported));
    }
    if let Some(map) = effective_profile.as_object_mut() {
        map.insert("bindings".to_string(), json!(new_bindings));
        map.insert(
            "capability_support".to_string(),
            Value::Object(capability_support),
        );
    }

    // ── EFSM transitions ────────────────────────────────────────────────────

    let mut active_efsm = if efsm_template.is_object() {
        efsm_template
    } else {
        json!({})
    };
    let transitions = field_array(&active_efsm, "transitions").to_vec();
    let transitions_before = transitions.len();
    let mut pruned: Vec<PrunedTransition> = Vec::new();
    let mut kept: Vec<Value> = Vec::new();
    for transition in &transitions {
        if !transition.is_object() {
            continue;
        }
        match prune_reason(transition, &scope, &cap_ids_kept, &cmd_ids_enabled, &tokens) {
            Some(reason) => pruned.push(PrunedTransition {
                transition_id: transition
                    .get("id")
                    .map(loose_string)
                    .filter(|id| !id.is_empty()),
                reason,
            }),
            None => kept.push(transition.clone()),
        }
    }

    // Drop states no surviving transition touches, keeping declared initial
    // states. If nothing survived, leave the state list alone.
    let all_states = field_array(&active_efsm, "states").to_vec();
    let mut used_state_ids: BTreeSet<String> = BTreeSet::new();
    for transition in &kept {
        for key in ["from", "to"] {
            let state = transition.get(key).map(loose_string).unwrap_or_default();
            if !state.is_empty() && state != "*" {
                used_state_ids.insert(state);
            }
        }
    }
    for state in &all_states {
        let kind = state.get("type").map(loose_string).unwrap_or_default();
        if kind.to_lowercase() == "initial" {
            let id = id_of(state);
            if !id.is_empty() {
                used_state_ids.insert(id);
            }
        }
    }
    if let Some(map) = active_efsm.as_object_mut() {
        map.insert("transitions".to_string(), json!(kept));
        if !used_state_ids.is_empty() {
            let retained: Vec<Value> = all_states
                .iter()
                .filter(|s| s.is_object() && used_state_ids.contains(&id_of(s)))
                .cloned()
                .collect();
            map.insert("states".to_string(), json!(retained));
        }
    }

    // ── compliance vs. manifest policy ──────────────────────────────────────

    let policy = manifest
        .get("policy")
        .filter(|p| p.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));
    let must_caps: Vec<String> = field_array(&policy, "must_have_capabilities")
        .iter()
        .map(loose_string)
        .collect();
    let allowed_missing: BTreeSet<String> = field_array(&policy, "allowed_missing_capabilities")
        .iter()
        .map(loose_string)
        .collect();
    let unsupported: Vec<String> = must_caps
        .iter()
        .filter(|cap| {
            !effective_profile
                .get("capability_support")
                .and_then(|support| support.get(cap.as_str()))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    let compliance_blockers: Vec<String> = unsupported
        .iter()
        .filter(|cap| !allowed_missing.contains(*cap))
        .cloned()
        .collect();
    let allowed_missing_hit: Vec<String> = unsupported
        .iter()
        .filter(|cap| allowed_missing.contains(*cap))
        .cloned()
        .collect();

    let mut warnings = Vec::new();
    if !pruned.is_empty() {
        warnings.push(format!("pruned_transitions={}", pruned.len()));
    }
    if !compliance_blockers.is_empty() {
        warnings.push(format!(
            "must_have_missing={}",
            compliance_blockers.join(",")
        ));
    }

    let llm_advice = if use_llm {
        advise(runner, &warnings, &pruned, &compliance_blockers, &scope.scope_doc)
    } else {
        AdvisorNote::disabled("")
    };

    let report = CompileReport {
        compiler: COMPILER_VERSION.to_string(),
        warnings,
        pruned_transitions: pruned,
        unsupported_must_have_capabilities: compliance_blockers,
        allowed_missing_capabilities: allowed_missing_hit,
        stats: CompileStats {
            capabilities: cap_ids_kept.len(),
            commands: cmd_ids_enabled.len(),
            transitions_before,
            transitions_after: kept.len(),
        },
        llm_advice,
    };

    info!(
        "compiled scope: {} capabilities, {} commands, {}/{} transitions kept",
        report.stats.capabilities,
        report.stats.commands,
        report.stats.transitions_after,
        report.stats.transitions_before,
    );

    let report_value =
        serde_json::to_value(&report).map_err(|source| AtForgeError::Serialize {
            what: "compile report".to_string(),
            source,
        })?;
    store.save_build(
        &effective_spec,
        &effective_profile,
        &active_efsm,
        &report_value,
    )?;

    Ok(CompileOutput {
        effective_spec,
        effective_profile,
        active_efsm,
        report,
    })
}

/// AT token lookups used for step-level pruning. `to_cap_all` spans the
/// whole merged command table; `to_cap` and `enabled` only the commands
/// that survived the scope.
struct TokenIndex {
    to_cap_all: BTreeMap<String, String>,
    to_cap: BTreeMap<String, String>,
    enabled: BTreeSet<String>,
}

/// First matching prune reason for a transition, or `None` to keep it.
///
/// Check order: action capability, single command, command sequence, step
/// tokens, then the id/state family heuristic.
fn prune_reason(
    transition: &Value,
    scope: &ScopeFilter,
    cap_ids_kept: &BTreeSet<String>,
    cmd_ids_enabled: &BTreeSet<String>,
    tokens: &TokenIndex,
) -> Option<String> {
    let action = transition
        .get("action")
        .filter(|a| a.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}));

    let cap = action.get("capability").map(loose_string).unwrap_or_default();
    if !cap.is_empty() && !cap_ids_kept.contains(&cap) {
        return Some(format!("capability_disabled:{cap}"));
    }

    let cmd_id = action.get("cmd_id").map(loose_string).unwrap_or_default();
    if !cmd_id.is_empty() && !cmd_ids_enabled.contains(&cmd_id) {
        return Some(format!("command_disabled:{cmd_id}"));
    }

    if let Some(sequence) = action.get("cmd_sequence").and_then(Value::as_array) {
        for entry in sequence {
            let cid = loose_string(entry);
            if !cmd_ids_enabled.contains(&cid) {
                return Some(format!("command_disabled:{cid}"));
            }
        }
    }

    for step in field_array(&action, "steps") {
        let Some(fields) = step.as_object() else {
            continue;
        };
        let mut send = fields.get("send").map(loose_string).unwrap_or_default();
        if send.is_empty()
            && let Some(cmd) = fields.get("cmd").and_then(Value::as_object)
        {
            send = cmd.get("send").map(loose_string).unwrap_or_default();
        }
        let token = extract_token(&send);
        if token.is_empty() {
            continue;
        }
        if let Some(cap_for_token) = tokens.to_cap_all.get(&token)
            && scope.cap_disabled(cap_for_token)
        {
            return Some(format!(
                "step_token_capability_disabled:{token}:{cap_for_token}"
            ));
        }
        if tokens.to_cap.contains_key(&token) && !tokens.enabled.contains(&token) {
            return Some(format!("step_token_disabled:{token}"));
        }
    }

    if !scope.disabled_families.is_empty() {
        let tid = transition.get("id").map(loose_string).unwrap_or_default().to_uppercase();
        let from = transition
            .get("from")
            .map(loose_string)
            .unwrap_or_default()
            .to_uppercase();
        let to = transition.get("to").map(loose_string).unwrap_or_default().to_uppercase();

        let family_hit = if [&tid, &from, &to].iter().any(|text| text.contains("SMS")) {
            "sms"
        } else if CALL_HINTS.iter().any(|hint| tid.contains(hint)) {
            "cs.call"
        } else {
            ""
        };
        if !family_hit.is_empty() && scope.disabled_families.contains(family_hit) {
            return Some(format!("transition_disabled_family:{family_hit}"));
        }
    }

    None
}

/// Ask the agent runner to review the compile result. Failures degrade to
/// a note; an unconfigured runner reports itself as disabled.
fn advise(
    runner: &dyn AgentRunner,
    warnings: &[String],
    pruned: &[PrunedTransition],
    blockers: &[String],
    scope_doc: &Value,
) -> AdvisorNote {
    let digest = json!({
        "warnings": warnings,
        "pruned": pruned.iter().take(30).collect::<Vec<_>>(),
        "unsupported_must_caps": blockers,
        "manifest_scope": scope_doc,
    });
    let prompt = format!(
        "Review this AT MBT compile result and reply with compact JSON \
         carrying fields risks[], repairs[], profile_patch_hints[].\n{digest}"
    );
    match runner.generate_text("Return only compact JSON.", &prompt) {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) if value.is_object() => AdvisorNote::structured(value),
            _ => AdvisorNote::text(text.chars().take(1500).collect::<String>()),
        },
        Err(AtForgeError::AgentUnavailable { .. }) => {
            AdvisorNote::disabled("agent runner not configured")
        }
        Err(err) => AdvisorNote::text(format!("advisor_error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::agent::NullAgentRunner;
    use crate::error::AtForgeError;

    use super::*;

    fn seeded_store() -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("at_agent"));
        store.ensure_assets().unwrap();
        (dir, store)
    }

    #[test]
    fn default_documents_compile_with_policy_gaps_only() {
        let (_dir, store) = seeded_store();
        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();

        assert_eq!(out.report.compiler, COMPILER_VERSION);
        assert_eq!(out.report.stats.capabilities, 9);
        assert_eq!(out.report.stats.commands, 16);
        assert_eq!(out.report.stats.transitions_before, 8);
        assert_eq!(out.report.stats.transitions_after, 8);
        assert!(out.report.pruned_transitions.is_empty());

        // The default policy names aspirational capabilities the baseline
        // does not provide.
        assert_eq!(
            out.report.unsupported_must_have_capabilities,
            vec!["device.functional_level", "sms.basic", "cs.call.basic"]
        );
        assert_eq!(
            out.report.warnings,
            vec!["must_have_missing=device.functional_level,sms.basic,cs.call.basic"]
        );

        // S5_CS_REGISTERED is declared but unreachable in the template walk.
        let states: Vec<&str> = out.active_efsm["states"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["id"].as_str())
            .collect();
        assert_eq!(states.len(), 9);
        assert!(!states.contains(&"S5_CS_REGISTERED"));

        assert!(!out.report.llm_advice.enabled);

        // Artifacts persisted.
        assert_eq!(
            store.runtime_spec()["capabilities"]
                .as_array()
                .unwrap()
                .len(),
            9
        );
        assert_eq!(
            store.load_build()["report"]["stats"]["commands"],
            json!(16)
        );
    }

    #[test]
    fn disabling_sms_prunes_family_and_transitions() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"]["disable_capabilities"] = json!(["sms.basic"]);
        store.save_manifest(&manifest).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();

        // sms.core is caught through family matching.
        let caps: Vec<&str> = out.effective_spec["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["id"].as_str())
            .collect();
        assert!(!caps.contains(&"sms.core"), "{caps:?}");
        assert_eq!(out.report.stats.capabilities, 8);
        assert_eq!(out.report.stats.commands, 13);

        // The SMS transition dies on its first missing sequence command.
        assert_eq!(out.report.pruned_transitions.len(), 1);
        let pruned = &out.report.pruned_transitions[0];
        assert_eq!(pruned.transition_id.as_deref(), Some("T_SMS_READY"));
        assert_eq!(pruned.reason, "command_disabled:sms.cmgf");
        assert!(out.report.warnings.contains(&"pruned_transitions=1".to_string()));

        // Its target state disappears with it.
        let states: Vec<&str> = out.active_efsm["states"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["id"].as_str())
            .collect();
        assert!(!states.contains(&"S9_SMS_READY"), "{states:?}");

        // capability_support no longer mentions the family.
        assert!(
            out.effective_profile["capability_support"]
                .get("sms.core")
                .is_none()
        );
    }

    #[test]
    fn missing_enable_list_keeps_nothing_but_preserves_states() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"] = json!({});
        store.save_manifest(&manifest).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        assert_eq!(out.report.stats.capabilities, 0);
        assert_eq!(out.report.stats.commands, 0);
        assert_eq!(out.report.stats.transitions_after, 0);
        // All transitions fall to their first unavailable command.
        assert!(
            out.report
                .pruned_transitions
                .iter()
                .all(|p| p.reason.starts_with("command_disabled:"))
        );
        // With no survivors the state list is left untouched.
        assert_eq!(out.active_efsm["states"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn mistyped_enable_list_falls_open() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"]["enable_capabilities"] = json!("everything");
        store.save_manifest(&manifest).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        assert_eq!(out.report.stats.capabilities, 9);
    }

    #[test]
    fn step_tokens_prune_against_disabled_capability() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"]["disable_capabilities"] = json!(["sms.core"]);
        store.save_manifest(&manifest).unwrap();

        let mut efsm = store.load_efsm();
        efsm["transitions"].as_array_mut().unwrap().push(json!({
            "id": "T_RAW_SEND",
            "from": "S1_AT_READY",
            "to": "S1_AT_READY",
            "action": {"steps": [{"send": "AT+CMGS=\"+8210\""}]},
        }));
        store.save_efsm(&efsm).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        let reasons: Vec<&str> = out
            .report
            .pruned_transitions
            .iter()
            .map(|p| p.reason.as_str())
            .collect();
        assert!(
            reasons.contains(&"step_token_capability_disabled:CMGS:sms.core"),
            "{reasons:?}"
        );
    }

    #[test]
    fn family_heuristic_catches_unannotated_transitions() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"]["disable_capabilities"] = json!(["cs.call.basic"]);
        store.save_manifest(&manifest).unwrap();

        let mut efsm = store.load_efsm();
        efsm["transitions"].as_array_mut().unwrap().push(json!({
            "id": "T_MO_DIAL",
            "from": "S5_CS_REGISTERED",
            "to": "S5_CS_REGISTERED",
            "action": {},
        }));
        store.save_efsm(&efsm).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        let pruned: Vec<(&str, &str)> = out
            .report
            .pruned_transitions
            .iter()
            .map(|p| (p.transition_id.as_deref().unwrap_or(""), p.reason.as_str()))
            .collect();
        assert!(
            pruned.contains(&("T_MO_DIAL", "transition_disabled_family:cs.call")),
            "{pruned:?}"
        );
    }

    #[test]
    fn allowed_missing_splits_from_blockers() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["policy"]["must_have_capabilities"] = json!(["ps.attach", "sms.basic"]);
        manifest["policy"]["allowed_missing_capabilities"] = json!(["sms.basic"]);
        store.save_manifest(&manifest).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        // ps.attach is bound and supported; sms.basic is missing but waived.
        assert!(out.report.unsupported_must_have_capabilities.is_empty());
        assert_eq!(out.report.allowed_missing_capabilities, vec!["sms.basic"]);
        assert!(out.report.warnings.is_empty());
        assert_eq!(
            out.effective_profile["capability_support"]["ps.attach"],
            json!(true)
        );
    }

    #[test]
    fn binding_without_surviving_impl_reports_unsupported() {
        let (_dir, store) = seeded_store();
        let mut manifest = store.load_manifest();
        manifest["test_scope"]["disable_commands"] = json!(["cmd.cgatt"]);
        manifest["policy"]["must_have_capabilities"] = json!(["ps.attach"]);
        store.save_manifest(&manifest).unwrap();

        let out = compile_assets(&store, &NullAgentRunner, false).unwrap();
        assert_eq!(
            out.effective_profile["capability_support"]["ps.attach"],
            json!(false)
        );
        assert_eq!(
            out.report.unsupported_must_have_capabilities,
            vec!["ps.attach"]
        );
        // The binding survives with an emptied impl list.
        let binding = out.effective_profile["bindings"]
            .as_array()
            .unwrap()
            .iter()
            .find(|b| b["capability"] == json!("ps.attach"))
            .cloned()
            .unwrap();
        assert_eq!(binding["impl"], json!([]));
    }

    #[test]
    fn advisor_failures_never_fail_compile() {
        struct FailingRunner;
        impl AgentRunner for FailingRunner {
            fn generate_text(&self, _s: &str, _u: &str) -> crate::error::Result<String> {
                Err(AtForgeError::transport_unavailable("socket closed"))
            }
        }

        let (_dir, store) = seeded_store();
        let out = compile_assets(&store, &FailingRunner, true).unwrap();
        assert!(out.report.llm_advice.enabled);
        assert!(out.report.llm_advice.summary.starts_with("advisor_error:"));

        let out = compile_assets(&store, &NullAgentRunner, true).unwrap();
        assert!(!out.report.llm_advice.enabled);
        assert_eq!(out.report.llm_advice.summary, "agent runner not configured");
    }

    #[test]
    fn structured_advice_lands_in_report() {
        struct AdvisingRunner;
        impl AgentRunner for AdvisingRunner {
            fn generate_text(&self, _s: &str, user: &str) -> crate::error::Result<String> {
                assert!(user.contains("manifest_scope"));
                Ok(r#"{"summary": "scope is narrow", "risks": ["sms untested"]}"#.to_string())
            }
        }

        let (_dir, store) = seeded_store();
        let out = compile_assets(&store, &AdvisingRunner, true).unwrap();
        assert!(out.report.llm_advice.enabled);
        assert_eq!(out.report.llm_advice.summary, "scope is narrow");
        assert_eq!(
            out.report.llm_advice.extra.get("risks"),
            Some(&json!(["sms untested"]))
        );
    }
}
