//! Serial AT exchange over `serialport`.
//!
//! One exchange is open → clear buffers → write `cmd\r` → settle → bounded
//! read → classify. The port is reopened per exchange; modem ports tolerate
//! this and it keeps a wedged handle from poisoning the rest of a walk.

use std::io::Read;
use std::io::Write;
use std::time::Duration;

use serde_json::Value;
use serialport::ClearBuffer;
use serialport::DataBits;
use serialport::Parity;
use serialport::SerialPortType;
use serialport::StopBits;
use tracing::debug;

use atforge_protocol::ExchangeResult;
use atforge_protocol::SerialPortEntry;
use atforge_protocol::SerialPortList;
use atforge_protocol::TransportMode;

use crate::settings::SerialSettings;
use crate::transport::Transport;
use crate::transport::tail_chars;

/// Read budget per exchange, matching the modem-side response sizes this
/// walk provokes.
const READ_BUDGET: usize = 2048;

/// Line parameters for one serial session. Port and baud come from the
/// settings layer; framing is overlaid from the profile's transport block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
    pub data_bits: u8,
    pub parity: String,
    pub stop_bits: u8,
    pub read_timeout: Duration,
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baudrate: 115_200,
            data_bits: 8,
            parity: "N".to_string(),
            stop_bits: 1,
            read_timeout: Duration::from_millis(1200),
            settle: Duration::from_millis(200),
        }
    }
}

impl SerialConfig {
    pub fn from_settings(settings: &SerialSettings) -> Self {
        Self {
            port: settings.port.clone(),
            baudrate: settings.baudrate,
            read_timeout: Duration::from_millis(settings.read_timeout_ms),
            settle: Duration::from_millis(settings.settle_ms),
            ..Self::default()
        }
    }

    /// Overlay framing (data bits, parity, stop bits) from a profile's
    /// `transport` block. Port and baud are deliberately left alone: those
    /// belong to the caller's configuration, not the document.
    pub fn apply_profile(&mut self, profile: &Value) {
        let Some(transport) = profile.get("transport").and_then(Value::as_object) else {
            return;
        };
        if let Some(bits) = transport.get("data_bits").and_then(Value::as_u64) {
            self.data_bits = u8::try_from(bits).unwrap_or(8);
        }
        if let Some(parity) = transport.get("parity").and_then(Value::as_str) {
            self.parity = parity.to_string();
        }
        if let Some(bits) = transport.get("stop_bits").and_then(Value::as_u64) {
            self.stop_bits = u8::try_from(bits).unwrap_or(1);
        }
    }

    fn data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parity(&self) -> Parity {
        match self.parity.trim().to_ascii_uppercase().as_str() {
            "E" | "EVEN" => Parity::Even,
            "O" | "ODD" => Parity::Odd,
            _ => Parity::None,
        }
    }

    fn stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// Direct serial AT transport.
pub struct SerialTransport {
    config: SerialConfig,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl Transport for SerialTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Serial
    }

    fn exchange(&mut self, command: &str) -> ExchangeResult {
        if self.config.port.is_empty() {
            return ExchangeResult::failure(command, "serial port not configured");
        }
        let builder = serialport::new(self.config.port.as_str(), self.config.baudrate)
            .data_bits(self.config.data_bits())
            .parity(self.config.parity())
            .stop_bits(self.config.stop_bits())
            .timeout(self.config.read_timeout);
        let mut port = match builder.open() {
            Ok(port) => port,
            Err(err) => return ExchangeResult::failure(command, err.to_string()),
        };
        if let Err(err) = port.clear(ClearBuffer::All) {
            return ExchangeResult::failure(command, err.to_string());
        }

        let line = format!("{}\r", command.trim());
        if let Err(err) = port.write_all(line.as_bytes()) {
            return ExchangeResult::failure(command, err.to_string());
        }
        let _ = port.flush();
        std::thread::sleep(self.config.settle);

        let mut buf = vec![0u8; READ_BUDGET];
        let mut filled = 0;
        while filled < buf.len() {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => break,
                Err(err) => return ExchangeResult::failure(command, err.to_string()),
            }
        }

        let out = String::from_utf8_lossy(&buf[..filled]).to_string();
        let upper = out.to_uppercase();
        let ok = upper.contains("OK") || upper.contains("+CREG") || upper.contains("+COPS");
        debug!("serial exchange {:?} -> ok={ok} ({filled} bytes)", command.trim());
        ExchangeResult {
            ok,
            cmd: command.to_string(),
            stdout: tail_chars(&out, 4000),
            stderr: String::new(),
            code: None,
            note: None,
        }
    }
}

/// Enumerate serial ports. Trouble enumerating is reported in-band.
pub fn list_serial_ports() -> SerialPortList {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            return SerialPortList {
                ok: false,
                ports: Vec::new(),
                error: Some(err.to_string()),
            };
        }
    };
    let entries = ports
        .into_iter()
        .map(|info| {
            let (description, hwid) = match &info.port_type {
                SerialPortType::UsbPort(usb) => (
                    usb.product.clone().unwrap_or_default(),
                    format!("USB VID:PID={:04x}:{:04x}", usb.vid, usb.pid),
                ),
                _ => (String::new(), String::new()),
            };
            let name = info
                .port_name
                .rsplit('/')
                .next()
                .unwrap_or(info.port_name.as_str())
                .to_string();
            SerialPortEntry {
                device: info.port_name,
                name,
                description,
                hwid,
            }
        })
        .collect();
    SerialPortList {
        ok: true,
        ports: entries,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn profile_overlay_touches_framing_only() {
        let mut config = SerialConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 921_600,
            ..SerialConfig::default()
        };
        config.apply_profile(&json!({
            "transport": {"baudrate": 9600, "data_bits": 7, "parity": "E", "stop_bits": 2},
        }));
        assert_eq!(config.baudrate, 921_600);
        assert_eq!(config.data_bits(), DataBits::Seven);
        assert_eq!(config.parity(), Parity::Even);
        assert_eq!(config.stop_bits(), StopBits::Two);

        // No transport block: nothing changes.
        let before = config.clone();
        config.apply_profile(&json!({}));
        assert_eq!(config, before);
    }

    #[test]
    fn parity_parses_loose_spellings() {
        let mut config = SerialConfig::default();
        assert_eq!(config.parity(), Parity::None);
        config.parity = "odd".to_string();
        assert_eq!(config.parity(), Parity::Odd);
        config.parity = " even ".to_string();
        assert_eq!(config.parity(), Parity::Even);
        config.parity = "?".to_string();
        assert_eq!(config.parity(), Parity::None);
    }

    #[test]
    fn empty_port_fails_without_touching_hardware() {
        let mut transport = SerialTransport::new(SerialConfig::default());
        let res = transport.exchange("AT");
        assert!(!res.ok);
        assert_eq!(res.cmd, "AT");
        assert_eq!(res.stderr, "serial port not configured");
    }

    #[test]
    fn unopenable_port_fails_in_band() {
        let config = SerialConfig {
            port: "/dev/atforge-no-such-port".to_string(),
            ..SerialConfig::default()
        };
        let mut transport = SerialTransport::new(config);
        let res = transport.exchange("AT");
        assert!(!res.ok);
        assert!(!res.stderr.is_empty());
    }
}
