//! MBT executor: build a coverage-ordered transition plan over the active
//! EFSM and walk it against a transport.
//!
//! The walk never aborts: failed exchanges mark their transition failed and
//! the plan continues, so a run always yields a complete trace plus coverage
//! accounting. State only advances on success.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;
use tracing::info;

use atforge_protocol::Action;
use atforge_protocol::CommandEntry;
use atforge_protocol::CoverageSummary;
use atforge_protocol::RunSummary;
use atforge_protocol::StepTrace;

use crate::docs::field_array;
use crate::docs::id_of;
use crate::docs::loose_string;
use crate::store::DocumentStore;
use crate::template::command_template;
use crate::template::render_command;
use crate::transport::Transport;

/// Hard ceiling on planned transitions per run.
pub const MAX_PLAN_STEPS: usize = 200;

/// State every walk starts from.
const INITIAL_STATE: &str = "S0_BOOT";

/// Select and order the transitions for one walk.
///
/// Normal edges keep document order and come before global (`from`/`to` of
/// `"*"`) recovery edges. A transition whose non-empty coverage point tuple
/// was already planned is skipped; transitions without coverage points are
/// always planned. The plan stops at `max_steps`.
pub fn plan_transitions(efsm: &Value, max_steps: usize) -> Vec<Value> {
    let mut normal: Vec<&Value> = Vec::new();
    let mut global: Vec<&Value> = Vec::new();
    for transition in field_array(efsm, "transitions") {
        if !transition.is_object() {
            continue;
        }
        let from = transition.get("from").map(loose_string).unwrap_or_default();
        let to = transition.get("to").map(loose_string).unwrap_or_default();
        if from == "*" || to == "*" {
            global.push(transition);
        } else {
            normal.push(transition);
        }
    }

    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut plan = Vec::new();
    for transition in normal.into_iter().chain(global) {
        let points = coverage_points(transition);
        if !points.is_empty() {
            if seen.contains(&points) {
                continue;
            }
            seen.insert(points);
        }
        plan.push(transition.clone());
        if plan.len() >= max_steps {
            break;
        }
    }
    plan
}

/// Execute the MBT walk over the store's runtime documents.
///
/// `max_steps` is clamped to `[1, MAX_PLAN_STEPS]`. Documents resolve to the
/// compiled artifacts when present, else the source files, so a run works
/// before any compile.
pub fn run(store: &DocumentStore, transport: &mut dyn Transport, max_steps: usize) -> RunSummary {
    let spec = store.runtime_spec();
    let profile = store.runtime_profile();
    let efsm = store.runtime_efsm();

    let commands: BTreeMap<String, &Value> = field_array(&spec, "commands")
        .iter()
        .filter(|cmd| cmd.is_object())
        .filter_map(|cmd| {
            let id = id_of(cmd);
            (!id.is_empty()).then_some((id, cmd))
        })
        .collect();
    let template_for = |cmd_id: &str| -> String {
        commands.get(cmd_id).map(|cmd| command_template(cmd)).unwrap_or_default()
    };

    let plan = plan_transitions(&efsm, max_steps.clamp(1, MAX_PLAN_STEPS));
    let mut total: BTreeSet<String> = BTreeSet::new();
    for transition in &plan {
        total.extend(coverage_points(transition));
    }

    let mut steps: Vec<StepTrace> = Vec::new();

    // Init phase: fixed line setup before the walk; results are traced but
    // never affect state or coverage.
    let init_sequence = profile
        .get("defaults")
        .and_then(Value::as_object)
        .and_then(|defaults| defaults.get("init_sequence"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for item in &init_sequence {
        let (cmd_id, params) = match item.as_object() {
            Some(fields) => (
                fields.get("cmd_id").map(loose_string).unwrap_or_default(),
                fields
                    .get("params")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            ),
            None => (String::new(), Map::new()),
        };
        let cmd = render_command(&template_for(&cmd_id), &params);
        let result = transport.exchange(&cmd);
        steps.push(StepTrace::Init { cmd_id, cmd, result });
    }

    let mut current_state = INITIAL_STATE.to_string();
    let mut hit: BTreeSet<String> = BTreeSet::new();
    for transition in &plan {
        let transition_id = transition.get("id").map(loose_string).unwrap_or_default();
        let from = transition.get("from").map(loose_string).unwrap_or_default();
        let to = transition.get("to").map(loose_string).unwrap_or_default();
        let action = transition
            .get("action")
            .cloned()
            .unwrap_or(Value::Null);

        let mut dispatched: Vec<CommandEntry> = Vec::new();
        let ok = match Action::from_value(&action) {
            Action::Sequence { cmd_ids } => {
                let mut all_ok = true;
                for cmd_id in cmd_ids {
                    let cmd = render_command(&template_for(&cmd_id), &Map::new());
                    let result = transport.exchange(&cmd);
                    all_ok &= result.ok;
                    dispatched.push(CommandEntry { cmd_id, cmd, result });
                }
                all_ok
            }
            Action::Single { cmd_id, params } => {
                let cmd = render_command(&template_for(&cmd_id), &params);
                let result = transport.exchange(&cmd);
                let ok = result.ok;
                dispatched.push(CommandEntry { cmd_id, cmd, result });
                ok
            }
            // Raw step scripts are a pruning input, not an executable shape.
            Action::Steps { .. } | Action::Unsupported => false,
        };

        if ok {
            if let Some(next) = transition.get("to") {
                current_state = loose_string(next);
            }
            hit.extend(coverage_points(transition));
        }
        steps.push(StepTrace::Transition {
            transition_id,
            from,
            to,
            ok,
            commands: dispatched,
        });
    }

    info!(
        "mbt walk finished in {current_state}: {}/{} coverage points over {} transitions",
        hit.len(),
        total.len(),
        plan.len(),
    );
    RunSummary {
        mode: transport.mode(),
        final_state: current_state,
        coverage: CoverageSummary {
            covered: hit.len(),
            total: total.len(),
            points: hit.into_iter().collect(),
        },
        steps,
    }
}

/// A transition's coverage points, loosely stringified. Missing or
/// malformed coverage reads as no points.
fn coverage_points(transition: &Value) -> Vec<String> {
    transition
        .get("coverage")
        .and_then(Value::as_object)
        .and_then(|coverage| coverage.get("points"))
        .and_then(Value::as_array)
        .map(|points| points.iter().map(loose_string).collect())
        .unwrap_or_default()
}
