//! Telemetry over a USB BLE bridge.
//!
//! The bridge dongle scans for the Watchdog, subscribes to the telemetry
//! characteristic and writes each notification to its serial port as one
//! text line. The bridge identifies itself through its USB product or serial
//! string, which carries the advertised device name.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};

use super::link::{TelemetryLink, TelemetrySession};
use crate::protocol::LineSplitter;

const SCAN_POLL: Duration = Duration::from_millis(500);

pub struct SerialBridgeLink {
    baud_rate: u32,
}

impl SerialBridgeLink {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

/// Whether a port advertises the named device.
pub fn port_matches(info: &SerialPortInfo, device_name: &str) -> bool {
    let needle = device_name.to_ascii_lowercase();
    let contains = |s: &Option<String>| {
        s.as_deref()
            .map(|v| v.to_ascii_lowercase().contains(&needle))
            .unwrap_or(false)
    };
    match &info.port_type {
        SerialPortType::UsbPort(usb) => contains(&usb.product) || contains(&usb.serial_number),
        _ => info.port_name.to_ascii_lowercase().contains(&needle),
    }
}

fn find_port(device_name: &str, scan_timeout: Duration) -> Result<Option<SerialPortInfo>> {
    let deadline = Instant::now() + scan_timeout;
    loop {
        let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
        if let Some(found) = ports.into_iter().find(|p| port_matches(p, device_name)) {
            return Ok(Some(found));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(SCAN_POLL.min(deadline - now));
    }
}

impl TelemetryLink for SerialBridgeLink {
    fn connect(
        &mut self,
        device_name: &str,
        characteristic: &str,
        scan_timeout: Duration,
    ) -> Result<Option<Box<dyn TelemetrySession>>> {
        let Some(info) = find_port(device_name, scan_timeout)? else {
            return Ok(None);
        };
        let port = serialport::new(&info.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("failed to open bridge port {}", info.port_name))?;
        log::debug!(
            "bridge {} relays characteristic {}",
            info.port_name,
            characteristic
        );
        Ok(Some(Box::new(BridgeSession {
            address: info.port_name,
            port,
            splitter: LineSplitter::new(),
            ready: VecDeque::new(),
            connected: true,
        })))
    }
}

struct BridgeSession {
    address: String,
    port: Box<dyn SerialPort>,
    splitter: LineSplitter,
    ready: VecDeque<Vec<u8>>,
    connected: bool,
}

fn strip_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    line
}

impl TelemetrySession for BridgeSession {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn next_notification(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(Some(line));
        }
        self.port
            .set_timeout(timeout)
            .context("failed to set bridge read timeout")?;
        let mut buf = [0u8; 512];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                for line in self.splitter.push(&buf[..n]) {
                    let line = strip_line_ending(line);
                    if !line.is_empty() {
                        self.ready.push_back(line);
                    }
                }
                Ok(self.ready.pop_front())
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => {
                self.connected = false;
                Err(e).with_context(|| format!("bridge {} read failed", self.address))
            }
        }
    }
}
