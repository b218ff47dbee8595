use crate::drivers;
use crate::error::ConfigError;
use crate::filter::MovingAverage;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Everything a session needs to know before it starts. The host builds one,
/// and the session keeps its own copy for the whole run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Registry selector, e.g. `"simulated"`. Resolved from `instrument_name`
    /// when a saved config leaves it out.
    #[serde(default)]
    pub instrument_class: String,
    /// Display name written into file headers. `None` when a saved config
    /// leaves it out; an explicit empty string is kept as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_name: Option<String>,
    #[serde(default)]
    pub output_file: PathBuf,
    #[serde(default)]
    pub comments: String,
    #[serde(default = "default_filter_window")]
    pub filter_window: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_filter_window() -> usize {
    MovingAverage::DEFAULT_WINDOW
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for SessionConfig {
    fn default() -> Self {
        let first = &drivers::INSTRUMENTS[0];
        Self {
            instrument_class: first.selector.to_owned(),
            instrument_name: Some(first.name.to_owned()),
            output_file: PathBuf::new(),
            comments: String::new(),
            filter_window: default_filter_window(),
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SessionConfig = serde_json::from_str(&text)?;
        config.resolve_instrument()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Fills in whichever of `instrument_class` / `instrument_name` is missing,
    /// preferring the selector when both are present.
    pub fn resolve_instrument(&mut self) -> Result<&'static drivers::InstrumentEntry, ConfigError> {
        let entry = drivers::find(&self.instrument_class)
            .or_else(|| self.instrument_name.as_deref().and_then(drivers::find))
            .ok_or_else(|| {
                let key = if self.instrument_class.is_empty() {
                    self.instrument_name.clone().unwrap_or_default()
                } else {
                    self.instrument_class.clone()
                };
                ConfigError::UnknownInstrument(key)
            })?;
        self.instrument_class = entry.selector.to_owned();
        self.instrument_name.get_or_insert_with(|| entry.name.to_owned());
        Ok(entry)
    }
}
