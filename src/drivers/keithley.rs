use super::Instrument;
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM3";
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

const IO_TIMEOUT: Duration = Duration::from_secs(5);
const TERMINATOR: &str = "\n";

/// Keithley 2000 multimeter over RS-232, driven with SCPI.
///
/// Connecting resets the meter into autoranging DC volts. Every
/// `read_voltage` triggers one `:READ?` conversion.
pub struct Keithley2000 {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl Keithley2000 {
    pub const NAME: &'static str = "Keithley 2000 (Serial)";

    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            port: None,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let name = &self.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| anyhow!("Keithley 2000 on {name} is not connected"))
    }

    fn send(&mut self, command: &str) -> Result<()> {
        let port = self.port()?;
        port.write_all(format!("{command}{TERMINATOR}").as_bytes())
            .with_context(|| format!("failed to send {command:?}"))?;
        debug!("Sent command: {command}");
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.send(command)?;
        let port = self.port()?;
        let reply = read_reply(&mut **port, command)?;
        debug!("Received response: {reply}");
        Ok(reply)
    }

    fn configure(&mut self) -> Result<String> {
        self.send("*RST")?;
        self.send(":SENSE:FUNCTION 'VOLT:DC'")?;
        self.send(":SENSE:VOLTAGE:DC:RANGE:AUTO ON")?;
        self.query("*IDN?")
    }

    fn measure(&mut self) -> Result<f64> {
        let reply = self.query(":READ?")?;
        parse_reading(&reply)
    }
}

/// Reads up to and including the next `\n`, one byte at a time, so whatever
/// the meter sent after it stays queued for the next query.
fn read_reply<R: Read + ?Sized>(reader: &mut R, command: &str) -> Result<String> {
    let start = Instant::now();
    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if start.elapsed() > IO_TIMEOUT {
            return Err(anyhow!("timeout waiting for reply to {command:?}"));
        }
        match reader.read(&mut byte) {
            Ok(0) => return Err(anyhow!("port closed while waiting for reply to {command:?}")),
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => response.push(byte[0]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e).context("serial read failed"),
        }
    }
    Ok(String::from_utf8_lossy(&response).trim().to_string())
}

/// Takes the first field of a reading such as `+1.234567E-03`.
fn parse_reading(reply: &str) -> Result<f64> {
    let field = reply.split(',').next().unwrap_or_default().trim();
    field
        .parse::<f64>()
        .with_context(|| format!("unparseable reading {reply:?}"))
}

impl Instrument for Keithley2000 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn connect(&mut self) -> Result<()> {
        info!("Connecting to {} at {}...", Self::NAME, self.port_name);
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(IO_TIMEOUT)
            .open()
            .with_context(|| format!("cannot open serial port {}", self.port_name))?;
        self.port = Some(port);
        match self.configure() {
            Ok(identity) => {
                info!("Successfully connected. ID: {identity}");
                Ok(())
            }
            Err(e) => {
                self.port = None;
                Err(e.context("Keithley 2000 did not answer configuration"))
            }
        }
    }

    fn read_voltage(&mut self) -> f64 {
        match self.measure() {
            Ok(volts) => volts,
            Err(e) => {
                warn!("Error reading voltage: {e:#}");
                f64::NAN
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Disconnected from {}.", Self::NAME);
        }
    }
}
