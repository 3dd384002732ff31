//! Device discovery listings and transport debug reports.

use crate::run::ExchangeResult;
use crate::run::TransportMode;
use serde::Deserialize;
use serde::Serialize;

/// One enumerated serial port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortEntry {
    pub device: String,
    pub name: String,
    pub description: String,
    pub hwid: String,
}

/// Serial enumeration result. Enumeration trouble is data, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortList {
    pub ok: bool,
    pub ports: Vec<SerialPortEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One device row from `adb devices`, with the product model resolved for
/// online devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdbDeviceEntry {
    pub id: String,
    pub state: String,
    pub model: String,
}

/// ADB enumeration result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdbDeviceList {
    pub ok: bool,
    pub devices: Vec<AdbDeviceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the transport debug probes (`AT`/`AT+CREG?` over serial;
/// `adb version`/`devices`/`get-state`/`getprop` over the bridge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub ok: bool,
    pub mode: TransportMode,
    pub checks: Vec<ExchangeResult>,
}

impl DebugReport {
    /// `ok` is the conjunction of all checks.
    pub fn new(mode: TransportMode, checks: Vec<ExchangeResult>) -> Self {
        let ok = checks.iter().all(|c| c.ok);
        Self { ok, mode, checks }
    }
}
