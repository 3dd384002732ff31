//! Transition actions, parsed from the loose EFSM document shape into a
//! tagged union so the executor can match exhaustively instead of probing
//! dictionary keys.

use serde_json::Map;
use serde_json::Value;

/// What a transition does when taken.
///
/// Parsed with [`Action::from_value`]; precedence mirrors executor dispatch:
/// a `cmd_sequence` wins over a `cmd_id`, raw `steps` come last. Anything
/// else is [`Action::Unsupported`] and fails without dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// One command with a parameter map.
    Single {
        cmd_id: String,
        params: Map<String, Value>,
    },
    /// Ordered command ids, each dispatched with no params.
    Sequence { cmd_ids: Vec<String> },
    /// Raw interactive step templates (`send` or nested `cmd.send`).
    /// Used by the pruner's token analysis; the executor does not dispatch
    /// these and treats the transition as failed.
    Steps { sends: Vec<String> },
    /// Action object absent or carrying none of the known shapes.
    Unsupported,
}

impl Action {
    /// Interpret a transition's `action` value. Never fails: malformed
    /// shapes degrade to `Unsupported`, malformed elements to their zero
    /// values, matching the compile path's tolerance for loose documents.
    pub fn from_value(action: &Value) -> Self {
        let Some(map) = action.as_object() else {
            return Self::Unsupported;
        };
        if let Some(seq) = map.get("cmd_sequence").and_then(Value::as_array) {
            let cmd_ids = seq.iter().map(loose_str).collect();
            return Self::Sequence { cmd_ids };
        }
        if let Some(cmd_id) = map.get("cmd_id") {
            let cmd_id = loose_str(cmd_id);
            if !cmd_id.is_empty() {
                let params = map
                    .get("params")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                return Self::Single { cmd_id, params };
            }
        }
        let sends = step_sends(action);
        if !sends.is_empty() {
            return Self::Steps { sends };
        }
        Self::Unsupported
    }
}

/// Extract the raw send templates from an action's `steps` list.
///
/// Each step contributes its `send` string, or `cmd.send` when `send` is
/// absent or empty. Non-object steps and steps without either form are
/// skipped.
pub fn step_sends(action: &Value) -> Vec<String> {
    let Some(steps) = action.get("steps").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut sends = Vec::new();
    for step in steps {
        let Some(obj) = step.as_object() else {
            continue;
        };
        let mut send = obj
            .get("send")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if send.is_empty()
            && let Some(cmd) = obj.get("cmd").and_then(Value::as_object)
        {
            send = cmd
                .get("send")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
        if !send.is_empty() {
            sends.push(send);
        }
    }
    sends
}

/// String form of a loose JSON scalar: strings come back bare, other
/// scalars via their JSON rendering. Containers render as empty.
pub(crate) fn loose_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => v.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sequence_takes_precedence_over_cmd_id() {
        let action = json!({
            "cmd_sequence": ["v250.ate", "v250.atv"],
            "cmd_id": "cmd.cmee",
        });
        assert_eq!(
            Action::from_value(&action),
            Action::Sequence {
                cmd_ids: vec!["v250.ate".into(), "v250.atv".into()],
            }
        );
    }

    #[test]
    fn single_keeps_params_and_defaults_missing_map() {
        let action = json!({"cmd_id": "cmd.cfun", "params": {"fun": 1}});
        match Action::from_value(&action) {
            Action::Single { cmd_id, params } => {
                assert_eq!(cmd_id, "cmd.cfun");
                assert_eq!(params.get("fun"), Some(&json!(1)));
            }
            other => panic!("expected Single, got {other:?}"),
        }

        let bare = json!({"cmd_id": "cmd.cpin"});
        match Action::from_value(&bare) {
            Action::Single { params, .. } => assert!(params.is_empty()),
            other => panic!("expected Single, got {other:?}"),
        }
    }

    #[test]
    fn steps_collects_send_and_nested_cmd_send() {
        let action = json!({"steps": [
            {"send": "AT+CMGF=1"},
            {"cmd": {"send": "AT+CMGS={da}"}},
            {"note": "prompt"},
            "garbage",
        ]});
        assert_eq!(
            step_sends(&action),
            vec!["AT+CMGF=1".to_string(), "AT+CMGS={da}".to_string()]
        );
        assert_eq!(
            Action::from_value(&action),
            Action::Steps {
                sends: vec!["AT+CMGF=1".into(), "AT+CMGS={da}".into()],
            }
        );
    }

    #[test]
    fn malformed_shapes_are_unsupported() {
        assert_eq!(Action::from_value(&json!(null)), Action::Unsupported);
        assert_eq!(Action::from_value(&json!([1, 2])), Action::Unsupported);
        assert_eq!(Action::from_value(&json!({})), Action::Unsupported);
        assert_eq!(
            Action::from_value(&json!({"cmd_id": ""})),
            Action::Unsupported
        );
    }

    #[test]
    fn sequence_ids_are_loosely_stringified() {
        let action = json!({"cmd_sequence": ["a", 7, null]});
        assert_eq!(
            Action::from_value(&action),
            Action::Sequence {
                cmd_ids: vec!["a".into(), "7".into(), String::new()],
            }
        );
    }
}
