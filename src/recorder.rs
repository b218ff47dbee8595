use crate::config::SessionConfig;
use crate::error::SinkError;
use log::info;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const RECORD_COLUMNS: [&str; 3] = ["Timestamp", "Voltage_Raw (V)", "Voltage_Filtered (V)"];
const EVENT_COLUMNS: [&str; 2] = ["Timestamp", "Event_Comment"];
const EVENT_EXTENSION: &str = "events.csv";

/// `2024-05-01T13:02:11.482913`, local time.
pub fn timestamp_now() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Shortest round-trip form that always keeps a fractional part (`1.0`, not `1`).
pub fn format_voltage(value: f64) -> String {
    if value.is_nan() {
        "nan".to_owned()
    } else {
        format!("{value:?}")
    }
}

/// `run.csv` -> `run.events.csv`
pub fn events_path(record_path: &Path) -> PathBuf {
    record_path.with_extension(EVENT_EXTENSION)
}

/// Collapses a free-text comment onto one line.
pub fn sanitize_comment(comment: &str) -> String {
    comment.replace(['\n', '\r'], " ")
}

/// Header material shared by both files of a run.
#[derive(Clone, Debug)]
struct Preamble {
    comments: String,
    instrument_name: String,
}

impl Preamble {
    fn from_config(config: &SessionConfig) -> Self {
        Self {
            comments: config.comments.clone(),
            instrument_name: config
                .instrument_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_owned()),
        }
    }

    fn render(&self) -> String {
        let mut text = String::new();
        // every line of the operator's text gets a row, blank ones included
        for line in self.comments.split('\n') {
            text.push_str("# ");
            text.push_str(line.strip_suffix('\r').unwrap_or(line));
            text.push('\n');
        }
        text.push_str(&format!("# Instrument: {}\n", self.instrument_name));
        text.push_str(&format!("# Start Time: {}\n", timestamp_now()));
        text.push('\n');
        text
    }
}

/// One append-only CSV file. Rows are flushed as soon as they are written.
struct CsvFile {
    path: PathBuf,
    preamble: Preamble,
    writer: Option<csv::Writer<File>>,
}

impl CsvFile {
    fn new(path: PathBuf, preamble: Preamble) -> Self {
        Self {
            path,
            preamble,
            writer: None,
        }
    }

    fn open(&mut self, columns: &[&str]) -> Result<(), SinkError> {
        let mut file = File::create(&self.path).map_err(|source| SinkError::Create {
            path: self.path.clone(),
            source,
        })?;
        file.write_all(self.preamble.render().as_bytes())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(columns).map_err(|source| SinkError::Csv {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Some(writer);
        Ok(())
    }

    fn append(&mut self, row: &[&str]) -> Result<(), SinkError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writer.write_record(row).map_err(|source| SinkError::Csv {
            path: self.path.clone(),
            source,
        })?;
        writer.flush().map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Returns `true` if a handle was actually released.
    fn close(&mut self) -> bool {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush().ok();
                true
            }
            None => false,
        }
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

/// Raw and filtered voltage, one row per sample.
pub struct RecordSink {
    file: CsvFile,
    rows_written: u64,
}

impl RecordSink {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            file: CsvFile::new(config.output_file.clone(), Preamble::from_config(config)),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn open(&mut self) -> Result<(), SinkError> {
        self.file.open(&RECORD_COLUMNS)?;
        self.rows_written = 0;
        info!("Opened data sink: {}", self.path().display());
        Ok(())
    }

    /// No-op unless the sink is open.
    pub fn write(&mut self, raw: f64, filtered: f64) -> Result<(), SinkError> {
        if !self.is_open() {
            return Ok(());
        }
        let (timestamp, raw, filtered) = (timestamp_now(), format_voltage(raw), format_voltage(filtered));
        self.file.append(&[&timestamp, &raw, &filtered])?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.file.close() {
            info!(
                "Closing data sink: {} ({} rows)",
                self.path().display(),
                self.rows_written()
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

/// Operator comments, stored next to the record file as `<stem>.events.csv`.
pub struct EventSink {
    file: CsvFile,
}

impl EventSink {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            file: CsvFile::new(
                events_path(&config.output_file),
                Preamble::from_config(config),
            ),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn open(&mut self) -> Result<(), SinkError> {
        self.file.open(&EVENT_COLUMNS)?;
        info!("Opened event sink: {}", self.path().display());
        Ok(())
    }

    /// No-op unless the sink is open.
    pub fn write_event(&mut self, comment: &str) -> Result<(), SinkError> {
        if !self.is_open() {
            return Ok(());
        }
        let clean = sanitize_comment(comment);
        self.file.append(&[&timestamp_now(), &clean])?;
        info!("Logged event: {clean}");
        Ok(())
    }

    pub fn close(&mut self) {
        if self.file.close() {
            info!("Closing event sink: {}", self.path().display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }
}
