use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::buckets::BucketLayout;
use crate::config::AnalyzerConfig;
use crate::error::ConfigError;

/// Added to the average magnitude before taking the log.
const MAGNITUDE_EPSILON: f64 = 1e-9;

/// Turns one mono window into `bar_count` intensities in `[0, 1]`.
///
/// All buffers are allocated up front; `analyze_into` does no allocation so it
/// can run inline on the audio thread.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    layout: BucketLayout,
    min_db: f64,
    max_db: f64,
    gamma: f64,
}

impl SpectrumAnalyzer {
    pub fn new(config: &AnalyzerConfig, sample_rate: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }

        let n = config.fft_length;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            window: hann_window(n),
            spectrum: vec![Complex::new(0.0, 0.0); n],
            scratch,
            magnitudes: vec![0.0; n / 2],
            layout: BucketLayout::new(config, sample_rate),
            min_db: f64::from(config.min_db),
            max_db: f64::from(config.max_db),
            gamma: f64::from(config.gamma),
        })
    }

    pub fn fft_length(&self) -> usize {
        self.window.len()
    }

    pub fn bar_count(&self) -> usize {
        self.layout.bar_count
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Magnitudes of the most recent window, bins `0..N/2`.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn analyze(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut bars = vec![0.0; self.bar_count()];
        self.analyze_into(samples, &mut bars);
        bars
    }

    /// Writes one value per bar into `out`. Missing trailing samples are
    /// treated as silence; surplus samples and surplus `out` slots are ignored.
    pub fn analyze_into(&mut self, samples: &[f32], out: &mut [f32]) {
        let n = self.fft_length();

        for (i, slot) in self.spectrum.iter_mut().enumerate() {
            let s = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let scale = 1.0 / n as f32;
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum[..n / 2]) {
            *mag = c.norm() * scale;
        }

        for (b, value) in out.iter_mut().take(self.bar_count()).enumerate() {
            let range = self.layout.range(b);
            let count = range.len();
            let avg = if count > 0 {
                self.magnitudes[range].iter().map(|&m| f64::from(m)).sum::<f64>() / count as f64
            } else {
                0.0
            };
            *value = self.shape(avg);
        }
    }

    fn shape(&self, magnitude: f64) -> f32 {
        let db = 20.0 * (magnitude + MAGNITUDE_EPSILON).log10();
        let norm = ((db - self.min_db) / (self.max_db - self.min_db)).clamp(0.0, 1.0);
        norm.powf(self.gamma) as f32
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
