use super::Instrument;
use log::info;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

const READ_LATENCY: Duration = Duration::from_millis(50);
const NOISE_SIGMA: f64 = 0.2;
const DRIFT_SCALE: f64 = 0.1;
const START_BASELINE: f64 = 10.0;

/// Random-walk voltage source for running without hardware.
pub struct SimulatedInstrument {
    baseline: f64,
}

impl SimulatedInstrument {
    pub const NAME: &'static str = "Simulated Instrument (Random)";

    pub fn new() -> Self {
        Self {
            baseline: START_BASELINE,
        }
    }

    fn next_value(&mut self, rng: &mut impl Rng) -> f64 {
        let drift = (PI * rng.gen::<f64>()).sin() * DRIFT_SCALE;
        self.baseline += drift;
        let noise: f64 = rng.sample(StandardNormal);
        self.baseline + noise * NOISE_SIGMA
    }
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument for SimulatedInstrument {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        info!("Simulated instrument connected.");
        Ok(())
    }

    fn read_voltage(&mut self) -> f64 {
        thread::sleep(READ_LATENCY);
        self.next_value(&mut rand::thread_rng())
    }

    fn close(&mut self) {
        info!("Simulated instrument disconnected.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn baseline_only_drifts_upward() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sim = SimulatedInstrument::new();
        let mut last = sim.baseline;
        for _ in 0..200 {
            let value = sim.next_value(&mut rng);
            assert!(value.is_finite());
            assert!(sim.baseline >= last);
            assert!(sim.baseline - last <= DRIFT_SCALE + 1e-9);
            last = sim.baseline;
        }
    }

    #[test]
    fn noise_spread_matches_sigma() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut sim = SimulatedInstrument::new();
        let residuals: Vec<f64> = (0..5000)
            .map(|_| sim.next_value(&mut rng) - sim.baseline)
            .collect();
        let n = residuals.len() as f64;
        let mean = residuals.iter().sum::<f64>() / n;
        let sd = (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!(mean.abs() < 0.02, "mean {mean}");
        assert!((sd - NOISE_SIGMA).abs() < 0.02, "sd {sd}");
    }

    #[test]
    fn read_honours_latency() {
        let mut sim = SimulatedInstrument::new();
        sim.connect().unwrap();
        let started = std::time::Instant::now();
        let value = sim.read_voltage();
        assert!(started.elapsed() >= READ_LATENCY);
        assert!((value - START_BASELINE).abs() < 5.0);
        sim.close();
    }
}
