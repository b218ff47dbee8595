// src/drivers/mod.rs
pub mod keithley;
#[cfg(test)]
pub mod scripted;
pub mod simulated;

pub use keithley::Keithley2000;
pub use simulated::SimulatedInstrument;

use crate::config::SessionConfig;

/// Capability contract every voltage source implements.
///
/// `read_voltage` blocks for the instrument's acquisition latency and cannot
/// be interrupted. A failed read comes back as NaN rather than an error, so
/// glitches end up in the data files like any other sample.
pub trait Instrument: Send {
    /// Display name. Must not require a live connection.
    fn name(&self) -> &str;
    fn connect(&mut self) -> anyhow::Result<()>;
    fn read_voltage(&mut self) -> f64;
    /// Safe to call more than once, and on an instrument that never connected.
    fn close(&mut self);
}

/// One row of the instrument registry.
pub struct InstrumentEntry {
    /// Stable key stored in config files as `instrument_class`.
    pub selector: &'static str,
    pub name: &'static str,
    build: fn(&SessionConfig) -> Box<dyn Instrument>,
}

impl InstrumentEntry {
    pub fn build(&self, config: &SessionConfig) -> Box<dyn Instrument> {
        (self.build)(config)
    }
}

fn build_simulated(_config: &SessionConfig) -> Box<dyn Instrument> {
    Box::new(SimulatedInstrument::new())
}

fn build_keithley(config: &SessionConfig) -> Box<dyn Instrument> {
    let port = config
        .serial_port
        .clone()
        .unwrap_or_else(|| keithley::DEFAULT_PORT.to_owned());
    Box::new(Keithley2000::new(port, config.baud_rate))
}

pub static INSTRUMENTS: &[InstrumentEntry] = &[
    InstrumentEntry {
        selector: "simulated",
        name: SimulatedInstrument::NAME,
        build: build_simulated,
    },
    InstrumentEntry {
        selector: "keithley2000",
        name: Keithley2000::NAME,
        build: build_keithley,
    },
];

/// Looks an entry up by selector or by display name.
pub fn find(key: &str) -> Option<&'static InstrumentEntry> {
    INSTRUMENTS
        .iter()
        .find(|entry| entry.selector == key || entry.name == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_selectors_and_names() {
        assert_eq!(find("simulated").unwrap().name, SimulatedInstrument::NAME);
        assert_eq!(find(Keithley2000::NAME).unwrap().selector, "keithley2000");
        assert!(find("").is_none());
        assert!(find("lock-in amplifier").is_none());
    }

    #[test]
    fn built_instruments_report_their_names_before_connecting() {
        let config = SessionConfig::default();
        for entry in INSTRUMENTS {
            let mut instrument = entry.build(&config);
            assert_eq!(instrument.name(), entry.name);
            instrument.close();
        }
    }
}
