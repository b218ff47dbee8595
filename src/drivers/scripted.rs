//! Deterministic instruments for exercising the acquisition loop in tests.
use super::Instrument;
use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Counts `close` calls so tests can check cleanup ran.
#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the same value every millisecond.
pub struct ConstantInstrument {
    pub value: f64,
    pub closes: CloseCounter,
}

impl Instrument for ConstantInstrument {
    fn name(&self) -> &str {
        "Constant"
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn read_voltage(&mut self) -> f64 {
        thread::sleep(Duration::from_millis(1));
        self.value
    }

    fn close(&mut self) {
        self.closes.hit();
    }
}

/// Never reports ready.
pub struct RefusingInstrument {
    pub closes: CloseCounter,
}

impl Instrument for RefusingInstrument {
    fn name(&self) -> &str {
        "Unplugged Meter"
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        Err(anyhow!("no response on bus"))
    }

    fn read_voltage(&mut self) -> f64 {
        f64::NAN
    }

    fn close(&mut self) {
        self.closes.hit();
    }
}

/// Panics on the first read.
pub struct PanickingInstrument {
    pub closes: CloseCounter,
}

impl Instrument for PanickingInstrument {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn read_voltage(&mut self) -> f64 {
        panic!("bus fault");
    }

    fn close(&mut self) {
        self.closes.hit();
    }
}

/// Signals on `entered` when a read starts, then blocks until the test feeds
/// the value to return. A dropped feeder reads as NaN.
pub struct GatedInstrument {
    pub entered: Sender<()>,
    pub values: Receiver<f64>,
}

impl Instrument for GatedInstrument {
    fn name(&self) -> &str {
        "Gated"
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn read_voltage(&mut self) -> f64 {
        self.entered.send(()).ok();
        self.values.recv().unwrap_or(f64::NAN)
    }

    fn close(&mut self) {}
}

/// Panics when closed, optionally after refusing to connect.
pub struct StickyCloseInstrument {
    pub refuse: bool,
}

impl Instrument for StickyCloseInstrument {
    fn name(&self) -> &str {
        "Sticky"
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        if self.refuse {
            Err(anyhow!("no response on bus"))
        } else {
            Ok(())
        }
    }

    fn read_voltage(&mut self) -> f64 {
        0.0
    }

    fn close(&mut self) {
        panic!("port stuck");
    }
}
