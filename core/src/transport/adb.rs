//! ADB-shell bridge transport and device discovery.
//!
//! Bridge mode cannot reach the modem port directly, so `exchange` records
//! the AT intent and substitutes a `dumpsys telephony.registry` snapshot as
//! the observable (experimental mapping). Every subprocess run is bounded:
//! piped stdio drained on threads, `try_wait` polled against a deadline,
//! kill on overrun.

use std::io::Read;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;

use atforge_protocol::AdbDeviceEntry;
use atforge_protocol::AdbDeviceList;
use atforge_protocol::ExchangeResult;
use atforge_protocol::TransportMode;

use crate::transport::Transport;
use crate::transport::tail_chars;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MODEL_PROBE_TIMEOUT: Duration = Duration::from_secs(6);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(12);

/// Run a command to completion within `timeout`. Never panics and never
/// blocks past the deadline; spawn failures and overruns come back as
/// `ok: false` with code `-1`.
pub(crate) fn run_cmd(args: &[&str], timeout: Duration) -> ExchangeResult {
    let display = args.join(" ");
    let Some((program, rest)) = args.split_first() else {
        return ExchangeResult {
            code: Some(-1),
            ..ExchangeResult::failure(display, "empty command")
        };
    };
    let mut child = match Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return ExchangeResult {
                code: Some(-1),
                ..ExchangeResult::failure(display, err.to_string())
            };
        }
    };

    let stdout_drain = child.stdout.take().map(drain);
    let stderr_drain = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return ExchangeResult {
                    code: Some(-1),
                    ..ExchangeResult::failure(display, err.to_string())
                };
            }
        }
    };

    let stdout = stdout_drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let stderr = stderr_drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    match status {
        Some(status) => ExchangeResult {
            ok: status.success(),
            cmd: display,
            stdout: tail_chars(&stdout, 4000),
            stderr: tail_chars(&stderr, 2000),
            code: status.code(),
            note: None,
        },
        None => ExchangeResult {
            ok: false,
            cmd: display,
            stdout: tail_chars(&stdout, 4000),
            stderr: format!("timed out after {}ms", timeout.as_millis()),
            code: Some(-1),
            note: None,
        },
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Serials of online devices from an `adb devices` listing.
fn online_devices(listing: &str) -> Vec<String> {
    let mut devices = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        if line.is_empty() || line.to_lowercase().starts_with("list of devices") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(serial), Some(state)) = (parts.next(), parts.next()) else {
            continue;
        };
        if state == "device" {
            devices.push(serial.to_string());
        }
    }
    devices
}

/// Resolve a device serial: the preferred id when online, else the first
/// online device, else the preferred id as given.
pub(crate) fn pick_device(preferred: &str, timeout: Duration) -> String {
    let res = run_cmd(&["adb", "devices"], timeout);
    if !res.ok {
        return preferred.trim().to_string();
    }
    let devices = online_devices(&res.stdout);
    if !preferred.is_empty() && devices.iter().any(|d| d == preferred) {
        return preferred.to_string();
    }
    devices
        .into_iter()
        .next()
        .unwrap_or_else(|| preferred.trim().to_string())
}

/// Enumerate ADB devices, resolving the product model for online ones.
pub fn list_adb_devices() -> AdbDeviceList {
    let res = run_cmd(&["adb", "devices"], DISCOVERY_TIMEOUT);
    if !res.ok {
        let error = if res.stderr.is_empty() {
            "adb command failed".to_string()
        } else {
            res.stderr
        };
        return AdbDeviceList {
            ok: false,
            devices: Vec::new(),
            error: Some(error),
        };
    }
    let mut devices = Vec::new();
    for line in res.stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.to_lowercase().starts_with("list of devices") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(serial) = parts.next() else {
            continue;
        };
        let state = parts.next().unwrap_or("unknown").to_string();
        let model = if state == "device" {
            run_cmd(
                &["adb", "-s", serial, "shell", "getprop", "ro.product.model"],
                MODEL_PROBE_TIMEOUT,
            )
            .stdout
            .trim()
            .to_string()
        } else {
            String::new()
        };
        devices.push(AdbDeviceEntry {
            id: serial.to_string(),
            state,
            model,
        });
    }
    AdbDeviceList {
        ok: true,
        devices,
        error: None,
    }
}

/// Bridge transport: one resolved device, snapshot per exchange.
pub struct AdbTransport {
    device: String,
    timeout: Duration,
}

impl AdbTransport {
    /// Resolves the device once, up front. An empty resolution is kept and
    /// reported per-exchange rather than failing construction.
    pub fn new(preferred: &str, timeout: Duration) -> Self {
        let device = pick_device(preferred, timeout);
        debug!("bridge transport bound to device {device:?}");
        Self { device, timeout }
    }
}

impl Transport for AdbTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Bridge
    }

    fn exchange(&mut self, command: &str) -> ExchangeResult {
        if self.device.is_empty() {
            return ExchangeResult::failure(command, "no android device online");
        }
        let snapshot = run_cmd(
            &[
                "adb",
                "-s",
                &self.device,
                "shell",
                "dumpsys",
                "telephony.registry",
            ],
            self.timeout,
        );
        ExchangeResult {
            ok: snapshot.ok,
            cmd: command.to_string(),
            stdout: snapshot.stdout,
            stderr: snapshot.stderr,
            code: snapshot.code,
            note: Some(
                "experimental mapping: telephony snapshot stands in for a direct modem exchange"
                    .to_string(),
            ),
        }
    }
}
