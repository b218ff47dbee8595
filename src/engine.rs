// src/engine.rs
use crate::config::SessionConfig;
use crate::drivers::Instrument;
use crate::error::SessionError;
use crate::filter::{MovingAverage, StreamingFilter};
use crate::recorder::{EventSink, RecordSink};
use crate::types::{SessionEvent, SessionState};
use log::{debug, error, info, warn};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a paused loop sleeps before re-checking its flags when nobody
/// wakes it.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct ControlState {
    running: bool,
    paused: bool,
    phase: SessionState,
}

// 采集线程与 GUI 线程共享的状态
struct Shared {
    control: Mutex<ControlState>,
    wake: Condvar,
    event_sink: Mutex<EventSink>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event_sink(&self) -> MutexGuard<'_, EventSink> {
        self.event_sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SessionState) {
        self.control().phase = phase;
    }
}

/// Thread-safe control surface of one session. Cheap to clone; every clone
/// drives the same session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Asks the loop to exit after the current read. Also cancels a pause.
    /// Does not wait for the loop.
    pub fn request_stop(&self) {
        {
            let mut control = self.shared.control();
            control.running = false;
            control.paused = false;
        }
        self.shared.wake.notify_all();
        info!("Requesting acquisition stop...");
    }

    pub fn request_pause(&self) {
        let mut control = self.shared.control();
        if control.phase == SessionState::Running && control.running {
            control.paused = true;
            info!("Requesting acquisition pause...");
        }
    }

    pub fn request_resume(&self) {
        {
            let mut control = self.shared.control();
            if control.phase != SessionState::Running {
                return;
            }
            control.paused = false;
        }
        self.shared.wake.notify_all();
        info!("Requesting acquisition resume...");
    }

    /// Appends a comment to the event file. Silently dropped when the event
    /// sink is not open.
    pub fn annotate(&self, text: &str) {
        if let Err(e) = self.shared.event_sink().write_event(text) {
            warn!("Could not log event: {e}");
        }
    }

    pub fn state(&self) -> SessionState {
        let control = self.shared.control();
        if control.phase == SessionState::Running && control.paused {
            SessionState::Paused
        } else {
            control.phase
        }
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.shared.control().paused
    }
}

/// One connect -> sample -> disconnect run against a single instrument.
///
/// Build it, grab a [`SessionHandle`], then call [`AcquisitionSession::start`]
/// to move the loop onto its own thread. Results come back over the event
/// channel: a `RawSample`/`FilteredSample` pair per sample, at most one
/// `Error`, then exactly one `Finished`.
pub struct AcquisitionSession {
    config: SessionConfig,
    instrument: Box<dyn Instrument>,
    filter: Box<dyn StreamingFilter + Send>,
    events: Sender<SessionEvent>,
    shared: Arc<Shared>,
}

impl AcquisitionSession {
    pub fn new(
        config: SessionConfig,
        instrument: Box<dyn Instrument>,
        events: Sender<SessionEvent>,
    ) -> Self {
        let filter = MovingAverage::new(config.filter_window);
        debug!("Moving average window: {} samples", filter.window_size());
        let filter = Box::new(filter);
        let shared = Arc::new(Shared {
            control: Mutex::new(ControlState {
                running: true,
                paused: false,
                phase: SessionState::Idle,
            }),
            wake: Condvar::new(),
            event_sink: Mutex::new(EventSink::new(&config)),
        });
        Self {
            config,
            instrument,
            filter,
            events,
            shared,
        }
    }

    #[cfg(test)]
    pub fn with_filter(mut self, filter: Box<dyn StreamingFilter + Send>) -> Self {
        self.filter = filter;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Spawns the sampling thread and returns immediately.
    pub fn start(self) -> io::Result<JoinHandle<()>> {
        self.shared.set_phase(SessionState::Connecting);
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || self.run())
            .map_err(|e| {
                shared.set_phase(SessionState::Idle);
                e
            })
    }

    fn run(mut self) {
        let mut record_sink = RecordSink::new(&self.config);
        let mut outcome = panic::catch_unwind(AssertUnwindSafe(|| self.acquire(&mut record_sink)))
            .unwrap_or_else(|payload| Err(SessionError::Runtime(panic_message(payload.as_ref()))));

        // 清理：无论成功失败都按顺序关闭
        let closed = panic::catch_unwind(AssertUnwindSafe(|| self.instrument.close()));
        record_sink.close();
        self.shared.event_sink().close();

        if let Err(payload) = closed {
            let message = panic_message(payload.as_ref());
            if outcome.is_ok() {
                outcome = Err(SessionError::Runtime(message));
            } else {
                error!("Instrument close failed: {message}");
            }
        }

        match outcome {
            Ok(()) => {
                self.shared.set_phase(SessionState::Finished);
                info!("Acquisition loop finished.");
            }
            Err(e) => {
                error!("{e}");
                self.shared.set_phase(SessionState::Failed);
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
        self.emit(SessionEvent::Finished);
    }

    fn acquire(&mut self, record_sink: &mut RecordSink) -> Result<(), SessionError> {
        if let Err(e) = self.instrument.connect() {
            warn!("{}: {e:#}", self.instrument.name());
            return Err(SessionError::Connection(self.instrument.name().to_owned()));
        }
        record_sink
            .open()
            .map_err(|source| SessionError::RecordOpen {
                path: record_sink.path().to_path_buf(),
                source,
            })?;
        {
            let mut event_sink = self.shared.event_sink();
            event_sink.open().map_err(|source| SessionError::EventOpen {
                path: event_sink.path().to_path_buf(),
                source,
            })?;
        }

        self.shared.set_phase(SessionState::Running);
        info!("Acquisition thread started...");
        while self.keep_running() {
            let raw = self.instrument.read_voltage();
            let filtered = self.filter.process(raw);
            record_sink
                .write(raw, filtered)
                .map_err(|e| SessionError::Runtime(e.to_string()))?;
            self.emit(SessionEvent::RawSample(raw));
            self.emit(SessionEvent::FilteredSample(filtered));
        }
        self.shared.set_phase(SessionState::Stopping);
        Ok(())
    }

    /// Blocks while paused. Returns `false` once a stop has been requested.
    fn keep_running(&self) -> bool {
        let mut control = self.shared.control();
        while control.running && control.paused {
            control = self
                .shared
                .wake
                .wait_timeout(control, PAUSE_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        control.running
    }

    fn emit(&self, event: SessionEvent) {
        self.events.send(event).ok();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in instrument code".to_owned()
    }
}
