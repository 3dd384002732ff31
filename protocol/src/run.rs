//! Execution-side types: transport exchanges, step traces, run summaries.

use serde::Deserialize;
use serde::Serialize;

/// Which transport carries the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Direct serial AT exchange with the modem port.
    Serial,
    /// ADB shell bridge: telemetry snapshots stand in for AT responses.
    Bridge,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Bridge => "bridge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Some(Self::Serial),
            "bridge" => Some(Self::Bridge),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one command exchange. Transports never raise past their
/// boundary: failures arrive as `ok: false` with the message in `stderr`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResult {
    pub ok: bool,
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code for subprocess-backed exchanges (`-1` on spawn failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Annotation for indirect mappings (the ADB bridge marks its snapshot
    /// proxy here).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ExchangeResult {
    pub fn failure(cmd: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            cmd: cmd.into(),
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// One command dispatched inside a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub cmd_id: String,
    pub cmd: String,
    pub result: ExchangeResult,
}

/// One entry of the execution trace, tagged by phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StepTrace {
    /// Profile `defaults.init_sequence` entry, dispatched before the plan.
    Init {
        cmd_id: String,
        cmd: String,
        result: ExchangeResult,
    },
    /// One planned transition, with every command it dispatched.
    Transition {
        transition_id: String,
        from: String,
        to: String,
        ok: bool,
        commands: Vec<CommandEntry>,
    },
}

/// Coverage accounting for a run: `covered ⊆ total` always; `points` is the
/// sorted list of points actually hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub covered: usize,
    pub total: usize,
    pub points: Vec<String>,
}

/// Full result of an MBT walk. The trace is complete even when individual
/// transitions failed; failure never truncates observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: TransportMode,
    pub final_state: String,
    pub coverage: CoverageSummary,
    pub steps: Vec<StepTrace>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn transport_mode_parses_loosely() {
        assert_eq!(TransportMode::parse("serial"), Some(TransportMode::Serial));
        assert_eq!(
            TransportMode::parse("  Bridge "),
            Some(TransportMode::Bridge)
        );
        assert_eq!(TransportMode::parse("usb"), None);
    }

    #[test]
    fn step_trace_is_tagged_by_phase() {
        let init = StepTrace::Init {
            cmd_id: "v250.ate".into(),
            cmd: "ATE0".into(),
            result: ExchangeResult {
                ok: true,
                cmd: "ATE0".into(),
                stdout: "OK".into(),
                ..ExchangeResult::default()
            },
        };
        let v = serde_json::to_value(&init).unwrap();
        assert_eq!(v.get("phase"), Some(&json!("init")));

        let transition = StepTrace::Transition {
            transition_id: "T_INIT".into(),
            from: "S0_BOOT".into(),
            to: "S1_AT_READY".into(),
            ok: false,
            commands: vec![],
        };
        let v = serde_json::to_value(&transition).unwrap();
        assert_eq!(v.get("phase"), Some(&json!("transition")));
        assert_eq!(v.get("ok"), Some(&json!(false)));
    }

    #[test]
    fn exchange_result_failure_defaults() {
        let r = ExchangeResult::failure("AT", "serial port not configured");
        assert!(!r.ok);
        assert_eq!(r.cmd, "AT");
        assert_eq!(r.stdout, "");
        assert_eq!(r.code, None);
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("note").is_none());
    }
}
