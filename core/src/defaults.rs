//! Built-in default documents, seeded by the store when files are absent.
//!
//! The baseline models a minimal 3GPP TS 27.007/27.005 command surface; the
//! profile, EFSM template, manifest, and vendor extension match it. Users
//! edit the persisted copies; these values are only the first seed and the
//! reset source for the config layers.

use serde_json::Value;
use serde_json::json;

/// Normative baseline AT spec: capabilities + commands.
pub fn baseline_spec() -> Value {
    json!({
        "meta": {
            "id": "3gpp.base",
            "version": "0.1.0",
            "sources": [
                "3GPP TS 27.007 Rel-18 (ETSI TS 127 007 V18.6.0)",
                "3GPP TS 27.005 Rel-18 (ETSI TS 127 005 V18.0.0)",
            ],
        },
        "result_codes": {
            "final_ok": ["OK"],
            "final_error": ["ERROR"],
            "final_cme_error_prefix": "+CME ERROR:",
            "final_cms_error_prefix": "+CMS ERROR:",
        },
        "interaction": {
            "line_ending_tx": "\\r",
            "line_split_rx": ["\\r\\n", "\\n"],
            "prompt": {"chars": [">"], "sms_end_ctrlz": 26, "sms_cancel_esc": 27},
        },
        "capabilities": [
            {"id": "te_ta.formatting", "desc": "E/verbose errors", "depends": [], "signals": []},
            {"id": "device.identity", "desc": "CGMI/CGMM/CGMR/CGSN", "depends": ["te_ta.formatting"], "signals": []},
            {"id": "sim.pin", "desc": "CPIN", "depends": ["te_ta.formatting"], "signals": []},
            {"id": "phone.functionality", "desc": "CFUN", "depends": ["sim.pin"], "signals": []},
            {"id": "net.registration.cs", "desc": "CREG", "depends": ["phone.functionality"], "signals": ["+CREG:"]},
            {"id": "ps.attach", "desc": "CGATT", "depends": ["phone.functionality"], "signals": []},
            {"id": "pdp.define", "desc": "CGDCONT", "depends": ["ps.attach"], "signals": []},
            {"id": "pdp.activate", "desc": "CGACT", "depends": ["pdp.define"], "signals": []},
            {"id": "sms.core", "desc": "SMS core", "depends": ["te_ta.formatting", "sim.pin"], "signals": ["+CMTI:", "+CMT:", "+CDS:"]},
        ],
        "commands": [
            {"id": "v250.ate", "capability": "te_ta.formatting", "at": "ATE{val}", "ops": ["set"]},
            {"id": "v250.atv", "capability": "te_ta.formatting", "at": "ATV{val}", "ops": ["set"]},
            {"id": "cmd.cmee", "capability": "te_ta.formatting", "at": "AT+CMEE={n}", "ops": ["set", "read", "test"]},
            {"id": "cmd.cgmi", "capability": "device.identity", "at": "AT+CGMI", "ops": ["action"]},
            {"id": "cmd.cgmm", "capability": "device.identity", "at": "AT+CGMM", "ops": ["action"]},
            {"id": "cmd.cgmr", "capability": "device.identity", "at": "AT+CGMR", "ops": ["action"]},
            {"id": "cmd.cgsn", "capability": "device.identity", "at": "AT+CGSN", "ops": ["action"]},
            {"id": "cmd.cpin", "capability": "sim.pin", "at": "AT+CPIN{arg}", "ops": ["read", "set"]},
            {"id": "cmd.cfun", "capability": "phone.functionality", "at": "AT+CFUN={fun}", "ops": ["set", "read"]},
            {"id": "cmd.creg", "capability": "net.registration.cs", "at": "AT+CREG={n}", "ops": ["set", "read"]},
            {"id": "cmd.cgatt", "capability": "ps.attach", "at": "AT+CGATT={state}", "ops": ["set", "read"]},
            {"id": "cmd.cgdcont", "capability": "pdp.define", "at": "AT+CGDCONT={cid},\"{pdp_type}\",\"{apn}\"", "ops": ["set", "read"]},
            {"id": "cmd.cgact", "capability": "pdp.activate", "at": "AT+CGACT={state},{cid}", "ops": ["set", "read"]},
            {"id": "sms.cmgf", "capability": "sms.core", "at": "AT+CMGF={mode}", "ops": ["set", "read"]},
            {"id": "sms.cnmi", "capability": "sms.core", "at": "AT+CNMI={mode},{mt},{bm},{ds},{bfr}", "ops": ["set", "read"]},
            {"id": "sms.cmgs", "capability": "sms.core", "at": "AT+CMGS={da}", "ops": ["action"], "expect": {"prompt": ">"}},
        ],
    })
}

/// Generic 3GPP transport profile: line settings, init sequence, timeouts,
/// capability bindings.
pub fn transport_profile() -> Value {
    json!({
        "meta": {"id": "profile.generic_3gpp", "version": "0.1.0"},
        "transport": {
            "baudrate": 115200,
            "data_bits": 8,
            "parity": "N",
            "stop_bits": 1,
            "read_encoding": "latin-1",
            "line_ending_tx": "\r",
        },
        "defaults": {
            "init_sequence": [
                {"cmd_id": "v250.ate", "params": {"val": 0}},
                {"cmd_id": "v250.atv", "params": {"val": 1}},
                {"cmd_id": "cmd.cmee", "params": {"n": 2}},
            ],
            "timeouts": {
                "default_sec": 3,
                "network_register_sec": 180,
                "pdp_activate_sec": 60,
                "sms_send_sec": 60,
            },
        },
        "bindings": [
            {"capability": "device.identity", "impl": [{"cmd_id": "cmd.cgmi"}, {"cmd_id": "cmd.cgmm"}, {"cmd_id": "cmd.cgmr"}, {"cmd_id": "cmd.cgsn"}]},
            {"capability": "sim.pin", "impl": [{"cmd_id": "cmd.cpin"}]},
            {"capability": "phone.functionality", "impl": [{"cmd_id": "cmd.cfun"}]},
            {"capability": "net.registration.cs", "impl": [{"cmd_id": "cmd.creg"}]},
            {"capability": "ps.attach", "impl": [{"cmd_id": "cmd.cgatt"}]},
            {"capability": "pdp.define", "impl": [{"cmd_id": "cmd.cgdcont"}]},
            {"capability": "pdp.activate", "impl": [{"cmd_id": "cmd.cgact"}]},
            {"capability": "sms.core", "impl": [{"cmd_id": "sms.cmgf"}, {"cmd_id": "sms.cnmi"}, {"cmd_id": "sms.cmgs"}]},
        ],
        "vendor_overrides": {"example_quectel": {"add_cmds": [], "replace_bindings": []}},
    })
}

/// EFSM template walking boot → SMS/PDP readiness.
pub fn efsm_template() -> Value {
    json!({
        "meta": {"id": "efsm.3gpp_base", "version": "0.1.0"},
        "states": [
            {"id": "S0_BOOT"}, {"id": "S1_AT_READY"}, {"id": "S2_SIM_LOCKED"}, {"id": "S3_SIM_READY"},
            {"id": "S4_RF_ON"}, {"id": "S5_CS_REGISTERED"}, {"id": "S6_PS_ATTACHED"},
            {"id": "S7_PDP_DEFINED"}, {"id": "S8_PDP_ACTIVE"}, {"id": "S9_SMS_READY"},
        ],
        "transitions": [
            {"id": "T_INIT", "from": "S0_BOOT", "to": "S1_AT_READY", "action": {"cmd_sequence": ["v250.ate", "v250.atv", "cmd.cmee"]}, "coverage": {"points": ["init.sequence"]}},
            {"id": "T_CHECK_SIM", "from": "S1_AT_READY", "to": "S2_SIM_LOCKED", "action": {"cmd_id": "cmd.cpin", "params": {"arg": ""}}, "coverage": {"points": ["sim.pin.required"]}},
            {"id": "T_UNLOCK_SIM", "from": "S2_SIM_LOCKED", "to": "S3_SIM_READY", "action": {"cmd_id": "cmd.cpin", "params": {"arg": "=\"{PIN}\""}}, "coverage": {"points": ["sim.pin.unlock"]}},
            {"id": "T_RF_ON", "from": "S3_SIM_READY", "to": "S4_RF_ON", "action": {"cmd_id": "cmd.cfun", "params": {"fun": 1}}, "coverage": {"points": ["rf.on"]}},
            {"id": "T_ATTACH", "from": "S4_RF_ON", "to": "S6_PS_ATTACHED", "action": {"cmd_id": "cmd.cgatt", "params": {"state": 1}}, "coverage": {"points": ["ps.attach"]}},
            {"id": "T_DEFINE_PDP", "from": "S6_PS_ATTACHED", "to": "S7_PDP_DEFINED", "action": {"cmd_id": "cmd.cgdcont", "params": {"cid": 1, "pdp_type": "IPV4V6", "apn": "{APN}"}}, "coverage": {"points": ["pdp.define.cid1"]}},
            {"id": "T_ACTIVATE_PDP", "from": "S7_PDP_DEFINED", "to": "S8_PDP_ACTIVE", "action": {"cmd_id": "cmd.cgact", "params": {"state": 1, "cid": 1}}, "coverage": {"points": ["pdp.activate.cid1"]}},
            {"id": "T_SMS_READY", "from": "S3_SIM_READY", "to": "S9_SMS_READY", "action": {"cmd_sequence": ["sms.cmgf", "sms.cnmi"]}, "coverage": {"points": ["sms.setup"]}},
        ],
    })
}

/// Default test-scope manifest: everything enabled, policy list of
/// must-have capabilities, environment placeholders.
pub fn manifest() -> Value {
    json!({
        "baseline": "atspec.3gpp@0.2",
        "extensions": ["atspec.vendor.custom@1.0"],
        "policy": {
            "must_have_capabilities": [
                "device.functional_level",
                "net.registration.cs",
                "ps.attach",
                "pdp.define",
                "pdp.activate",
                "sms.basic",
                "cs.call.basic",
            ],
            "allowed_missing_capabilities": [],
        },
        "test_scope": {
            "enable_capabilities": ["*"],
            "disable_capabilities": [],
            "enable_commands": [],
            "disable_commands": [],
        },
        "env": {
            "apn": "internet",
            "pin_secret_ref": "vault://sim_pin",
            "mo_call_number": "+8210xxxxxxx",
            "sms_da": "+8210yyyyyyy",
        },
    })
}

/// Empty vendor extension shell.
pub fn vendor_extension() -> Value {
    json!({
        "meta": {"id": "atspec.vendor.custom", "version": "1.0"},
        "capabilities": [],
        "commands": [],
    })
}
