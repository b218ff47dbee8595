// src/filter.rs
use ndarray::Array1;

/// Sample-by-sample smoothing stage of the acquisition loop.
pub trait StreamingFilter {
    fn process(&mut self, raw: f64) -> f64;
}

/// 滑动窗口均值滤波
///
/// The window starts out zero-filled, so the first `window_size - 1` outputs
/// are pulled toward zero. NaN inputs poison the mean until they leave the
/// window.
pub struct MovingAverage {
    window: Array1<f64>,
    cursor: usize,
}

impl MovingAverage {
    pub const DEFAULT_WINDOW: usize = 10;

    /// A zero-sized window is clamped to 1.
    pub fn new(window_size: usize) -> Self {
        let size = window_size.max(1);
        Self {
            window: Array1::zeros(size),
            cursor: 0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl StreamingFilter for MovingAverage {
    fn process(&mut self, raw: f64) -> f64 {
        self.window[self.cursor] = raw;
        self.cursor = (self.cursor + 1) % self.window.len();
        self.window.mean().unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn warm_up_is_zero_padded() {
        let mut filter = MovingAverage::new(10);
        assert_eq!(filter.process(10.0), 1.0);
        assert_eq!(filter.process(20.0), 3.0);
    }

    #[test]
    fn unit_window_passes_input_through() {
        let mut filter = MovingAverage::new(1);
        for _ in 0..3 {
            assert_eq!(filter.process(5.0), 5.0);
        }
    }

    #[test]
    fn zero_window_is_clamped() {
        let mut filter = MovingAverage::new(0);
        assert_eq!(filter.window_size(), 1);
        assert_eq!(filter.process(-2.5), -2.5);
    }

    #[test]
    fn output_tracks_the_latest_window_only() {
        let window = 4;
        let inputs: Vec<f64> = (0..23).map(|i| ((i * 7) % 11) as f64 - 3.5).collect();
        let mut filter = MovingAverage::new(window);
        for (n, &value) in inputs.iter().enumerate() {
            let out = filter.process(value);
            if n + 1 >= window {
                let recent = &inputs[n + 1 - window..=n];
                let expected = recent.iter().sum::<f64>() / window as f64;
                assert!(approx_eq(out, expected), "sample {n}: {out} != {expected}");
            }
        }
    }

    #[test]
    fn nan_leaves_the_window_after_w_samples() {
        let mut filter = MovingAverage::new(2);
        filter.process(1.0);
        assert!(filter.process(f64::NAN).is_nan());
        assert!(filter.process(3.0).is_nan());
        assert_eq!(filter.process(5.0), 4.0);
    }
}
