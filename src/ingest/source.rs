use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;

use crate::protocol::LineSplitter;

/// Outcome of one read from the incident transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRead {
    /// One line including its terminator (absent only on the final line of
    /// a closed stream).
    Line(Vec<u8>),
    /// Nothing arrived within the read timeout.
    Idle,
    /// The stream ended.
    Closed,
}

/// Byte stream from the Reporter.
///
/// `read_line` blocks no longer than the source's read timeout so callers can
/// observe shutdown between reads.
pub trait IncidentSource: Send {
    fn describe(&self) -> String;

    fn read_line(&mut self) -> Result<SourceRead>;
}

#[derive(Clone, Debug)]
pub struct SerialSourceConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

/// Reporter attached over a serial port.
pub struct SerialIncidentSource {
    name: String,
    port: Box<dyn SerialPort>,
    splitter: LineSplitter,
    ready: VecDeque<Vec<u8>>,
}

impl SerialIncidentSource {
    pub fn open(config: &SerialSourceConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .with_context(|| {
                format!(
                    "failed to open serial port {} at {} baud",
                    config.port, config.baud_rate
                )
            })?;
        Ok(Self {
            name: config.port.clone(),
            port,
            splitter: LineSplitter::new(),
            ready: VecDeque::new(),
        })
    }
}

impl IncidentSource for SerialIncidentSource {
    fn describe(&self) -> String {
        format!("serial {}", self.name)
    }

    fn read_line(&mut self) -> Result<SourceRead> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(SourceRead::Line(line));
        }
        let mut buf = [0u8; 4096];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(SourceRead::Idle),
            Ok(n) => {
                self.ready.extend(self.splitter.push(&buf[..n]));
                Ok(self
                    .ready
                    .pop_front()
                    .map(SourceRead::Line)
                    .unwrap_or(SourceRead::Idle))
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(SourceRead::Idle)
            }
            Err(e) => Err(e).with_context(|| format!("serial port {} read failed", self.name)),
        }
    }
}

/// Replays a captured byte stream, for offline runs and tests.
pub struct ReaderSource<R> {
    name: String,
    reader: BufReader<R>,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader: BufReader::new(reader),
        }
    }
}

impl<R: Read + Send> IncidentSource for ReaderSource<R> {
    fn describe(&self) -> String {
        format!("replay {}", self.name)
    }

    fn read_line(&mut self) -> Result<SourceRead> {
        let mut line = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("replay {} read failed", self.name))?;
        if n == 0 {
            Ok(SourceRead::Closed)
        } else {
            Ok(SourceRead::Line(line))
        }
    }
}
