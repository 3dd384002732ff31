//! Command-template helpers: picking a template out of a command entry,
//! deriving the bare AT token, and rendering placeholders.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Map;
use serde_json::Value;

use crate::docs::loose_string;

/// Preferred order when a command carries per-operation `forms` instead of
/// a flat `at` template.
const FORM_ORDER: [&str; 6] = ["set", "read", "test", "exec", "exec_interactive", "action"];

/// Pull the template string out of a command entry.
///
/// A string `at` field wins; otherwise the first known form in
/// [`FORM_ORDER`], then any remaining string-valued form. Returns the empty
/// string for shapeless entries.
pub fn command_template(cmd: &Value) -> String {
    let Some(fields) = cmd.as_object() else {
        return String::new();
    };
    if let Some(at) = fields.get("at").and_then(Value::as_str) {
        return at.to_string();
    }
    if let Some(forms) = fields.get("forms").and_then(Value::as_object) {
        for key in FORM_ORDER {
            if let Some(template) = forms.get(key).and_then(Value::as_str) {
                return template.to_string();
            }
        }
        for value in forms.values() {
            if let Some(template) = value.as_str() {
                return template.to_string();
            }
        }
    }
    String::new()
}

/// Derive the command token from a template: `AT+CREG=...` → `CREG`,
/// `ATE0` → `E0`. Empty when the template is not an AT command.
pub fn extract_token(template: &str) -> String {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"^AT\+?([A-Z0-9]+)").unwrap();
        re
    });
    let text = template.trim().to_uppercase();
    re.captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Substitute `{name}` placeholders with the given params, then strip any
/// placeholder left unresolved. Unpaired braces stay as-is.
pub fn render_command(template: &str, params: &Map<String, Value>) -> String {
    let mut cmd = template.to_string();
    for (key, value) in params {
        cmd = cmd.replace(&format!("{{{key}}}"), &loose_string(value));
    }
    loop {
        let Some(start) = cmd.find('{') else { break };
        let Some(end) = cmd[start + 1..].find('}').map(|off| start + 1 + off) else {
            break;
        };
        cmd.replace_range(start..=end, "");
    }
    cmd
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn template_prefers_at_then_ordered_forms() {
        assert_eq!(
            command_template(&json!({"at": "AT+CREG={n}", "forms": {"read": "AT+CREG?"}})),
            "AT+CREG={n}"
        );
        assert_eq!(
            command_template(&json!({"forms": {"read": "AT+CREG?", "set": "AT+CREG={n}"}})),
            "AT+CREG={n}"
        );
        // No known form key: any string value serves.
        assert_eq!(
            command_template(&json!({"forms": {"custom": "AT+QCFG?"}})),
            "AT+QCFG?"
        );
        assert_eq!(command_template(&json!({"forms": {"set": 1}})), "");
        assert_eq!(command_template(&json!("not an object")), "");
    }

    #[test]
    fn token_extraction() {
        assert_eq!(extract_token("AT+CREG={n}"), "CREG");
        assert_eq!(extract_token("  at+cgdcont=1"), "CGDCONT");
        assert_eq!(extract_token("ATE0"), "E0");
        assert_eq!(extract_token("ATV1"), "V1");
        assert_eq!(extract_token("+CREG?"), "");
        assert_eq!(extract_token(""), "");
    }

    #[test]
    fn render_substitutes_and_strips_leftovers() {
        let cmd = render_command(
            "AT+CGDCONT={cid},\"{pdp_type}\",\"{apn}\"",
            &params(&[("cid", json!(1)), ("pdp_type", json!("IPV4V6"))]),
        );
        assert_eq!(cmd, "AT+CGDCONT=1,\"IPV4V6\",\"\"");
    }

    #[test]
    fn render_keeps_unpaired_braces() {
        assert_eq!(render_command("AT+X={a", &params(&[])), "AT+X={a");
        assert_eq!(render_command("AT+X=}a{", &params(&[])), "AT+X=}a{");
    }

    #[test]
    fn render_repeated_placeholder() {
        let cmd = render_command("AT+T={v};+U={v}", &params(&[("v", json!(2))]));
        assert_eq!(cmd, "AT+T=2;+U=2");
    }
}
