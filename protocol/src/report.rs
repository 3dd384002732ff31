//! Compile report emitted by the scope pruner.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Banner written into every report's `compiler` field.
pub const COMPILER_VERSION: &str = "ATSpec/EFSM Compiler v0.1";

/// A transition dropped during EFSM pruning, with the first matching reason
/// (`capability_disabled:…`, `command_disabled:…`,
/// `step_token_capability_disabled:…`, `step_token_disabled:…`,
/// `transition_disabled_family:…`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedTransition {
    pub transition_id: Option<String>,
    pub reason: String,
}

/// Before/after counts for the compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStats {
    pub capabilities: usize,
    pub commands: usize,
    pub transitions_before: usize,
    pub transitions_after: usize,
}

/// Advisory note attached to the report. When no advisor is wired the note
/// is present with `enabled: false`; advisor output (structured or free
/// text) lands in `summary`/`extra`. Advice never affects compile success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorNote {
    pub enabled: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdvisorNote {
    pub fn disabled(summary: impl Into<String>) -> Self {
        Self {
            enabled: false,
            summary: summary.into(),
            extra: Map::new(),
        }
    }

    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            enabled: true,
            summary: summary.into(),
            extra: Map::new(),
        }
    }

    /// Structured advisor output: keeps the object's fields, forces
    /// `enabled: true`, lifts a string `summary` field when present.
    pub fn structured(value: Value) -> Self {
        let mut extra = value.as_object().cloned().unwrap_or_default();
        extra.remove("enabled");
        let summary = match extra.remove("summary") {
            Some(Value::String(s)) => s,
            Some(other) => {
                extra.insert("summary".into(), other);
                String::new()
            }
            None => String::new(),
        };
        Self {
            enabled: true,
            summary,
            extra,
        }
    }
}

/// The full compile report, persisted as `build/compile_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileReport {
    pub compiler: String,
    pub warnings: Vec<String>,
    pub pruned_transitions: Vec<PrunedTransition>,
    pub unsupported_must_have_capabilities: Vec<String>,
    pub allowed_missing_capabilities: Vec<String>,
    pub stats: CompileStats,
    pub llm_advice: AdvisorNote,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn advisor_note_structured_lifts_summary() {
        let note = AdvisorNote::structured(json!({
            "summary": "two transitions pruned",
            "risks": ["sms coverage lost"],
        }));
        assert!(note.enabled);
        assert_eq!(note.summary, "two transitions pruned");
        assert_eq!(note.extra.get("risks"), Some(&json!(["sms coverage lost"])));
    }

    #[test]
    fn advisor_note_flattens_extra_fields_on_wire() {
        let note = AdvisorNote::structured(json!({"repairs": []}));
        let v = serde_json::to_value(&note).unwrap();
        assert_eq!(v, json!({"enabled": true, "summary": "", "repairs": []}));
    }

    #[test]
    fn report_round_trips() {
        let report = CompileReport {
            compiler: COMPILER_VERSION.to_string(),
            warnings: vec!["pruned_transitions=1".into()],
            pruned_transitions: vec![PrunedTransition {
                transition_id: Some("T_SMS_READY".into()),
                reason: "capability_disabled:sms.core".into(),
            }],
            unsupported_must_have_capabilities: vec!["sms.basic".into()],
            allowed_missing_capabilities: vec![],
            stats: CompileStats {
                capabilities: 8,
                commands: 13,
                transitions_before: 8,
                transitions_after: 7,
            },
            llm_advice: AdvisorNote::disabled("advisor not configured"),
        };
        let wire = serde_json::to_value(&report).unwrap();
        let back: CompileReport = serde_json::from_value(wire).unwrap();
        assert_eq!(back, report);
    }
}
