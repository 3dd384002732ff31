//! Transport adapters for dispatching AT commands to a device.
//!
//! Two adapters implement [`Transport`]:
//!
//! - [`serial::SerialTransport`]: direct serial exchange with the modem port.
//! - [`adb::AdbTransport`]: ADB-shell bridge that proxies AT intents through
//!   a telephony snapshot (experimental).
//!
//! Adapters never fail past their boundary: every exchange resolves to an
//! [`ExchangeResult`], with errors carried as `ok: false` plus `stderr`.

pub mod adb;
pub mod serial;

pub use adb::AdbTransport;
pub use adb::list_adb_devices;
pub use serial::SerialConfig;
pub use serial::SerialTransport;
pub use serial::list_serial_ports;

use std::time::Duration;

use atforge_protocol::DebugReport;
use atforge_protocol::ExchangeResult;
use atforge_protocol::TransportMode;

/// One device channel. `exchange` is blocking and bounded; a hung device
/// resolves to a failed result, never a stuck call.
pub trait Transport {
    fn mode(&self) -> TransportMode;
    fn exchange(&mut self, command: &str) -> ExchangeResult;
}

/// Probe the selected transport and report every check.
///
/// Serial mode sends `AT` and `AT+CREG?`. Bridge mode verifies the adb
/// binary, lists devices, and queries state + product model of the resolved
/// device.
pub fn debug_checks(
    mode: TransportMode,
    serial: &SerialConfig,
    adb_device: &str,
    adb_timeout: Duration,
) -> DebugReport {
    let checks = match mode {
        TransportMode::Serial => {
            let mut probe = SerialTransport::new(serial.clone());
            vec![probe.exchange("AT"), probe.exchange("AT+CREG?")]
        }
        TransportMode::Bridge => {
            let mut checks = vec![adb::run_cmd(&["adb", "version"], adb_timeout)];
            checks.push(adb::run_cmd(&["adb", "devices"], adb_timeout));
            let device = adb::pick_device(adb_device, adb_timeout);
            if device.is_empty() {
                checks.push(ExchangeResult::failure(
                    "adb get-state",
                    "no android device online",
                ));
            } else {
                checks.push(adb::run_cmd(&["adb", "-s", &device, "get-state"], adb_timeout));
                checks.push(adb::run_cmd(
                    &["adb", "-s", &device, "shell", "getprop", "ro.product.model"],
                    adb_timeout,
                ));
            }
            checks
        }
    };
    DebugReport::new(mode, checks)
}

/// Last `n` characters of `s`, whole string when shorter.
pub(crate) fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        s.to_string()
    } else {
        s.chars().skip(count - n).collect()
    }
}
