use std::ops::Range;

use crate::config::AnalyzerConfig;

/// Logarithmic split of the spectrum `[min_frequency, nyquist]` into bars.
///
/// Pure function of its four fields; the analyzer rebuilds nothing per window
/// but the ranges are cheap enough to recompute on every pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLayout {
    pub bar_count: usize,
    pub sample_rate: u32,
    pub fft_length: usize,
    pub min_frequency: f32,
}

impl BucketLayout {
    pub fn new(config: &AnalyzerConfig, sample_rate: u32) -> Self {
        Self {
            bar_count: config.bar_count,
            sample_rate,
            fft_length: config.fft_length,
            min_frequency: config.min_frequency,
        }
    }

    pub fn nyquist(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }

    /// Upper edge of the last bar. Never closer than 10% above `min_frequency`.
    pub fn max_frequency(&self) -> f64 {
        let min = f64::from(self.min_frequency);
        (min * 1.1).max(self.nyquist())
    }

    fn edge(&self, frac: f64) -> f64 {
        let min = f64::from(self.min_frequency);
        min * (self.max_frequency() / min).powf(frac)
    }

    /// Lower and upper edge frequency of bar `b` in Hz.
    pub fn frequency_range(&self, b: usize) -> (f64, f64) {
        let bars = self.bar_count as f64;
        (self.edge(b as f64 / bars), self.edge((b + 1) as f64 / bars))
    }

    /// Magnitude bins averaged into bar `b`. Always non-empty and inside `0..N/2`.
    pub fn range(&self, b: usize) -> Range<usize> {
        let half = self.fft_length / 2;
        let rate = f64::from(self.sample_rate);
        let n = self.fft_length as f64;
        let (f_start, f_end) = self.frequency_range(b);

        let bin_start = (f_start / rate * n).floor().max(0.0) as usize;
        let bin_end = (f_end / rate * n).ceil().max(0.0) as usize;

        let bin_start = bin_start.min(half - 1);
        let bin_end = bin_end.clamp(bin_start + 1, half);
        bin_start..bin_end
    }

    pub fn ranges(&self) -> Vec<Range<usize>> {
        (0..self.bar_count).map(|b| self.range(b)).collect()
    }

    /// Bar whose frequency span contains `freq`, or `None` outside
    /// `[min_frequency, max_frequency]`.
    pub fn bucket_for_frequency(&self, freq: f32) -> Option<usize> {
        let min = f64::from(self.min_frequency);
        let max = self.max_frequency();
        let freq = f64::from(freq);
        if !(min..=max).contains(&freq) {
            return None;
        }
        let frac = (freq / min).ln() / (max / min).ln();
        let b = (frac * self.bar_count as f64).floor() as usize;
        Some(b.min(self.bar_count - 1))
    }

    /// Lowest frequency at which a bar spans at least one FFT bin.
    ///
    /// Below it neighbouring bars share the same bins, so a tone can peak a
    /// couple of bars away from [`bucket_for_frequency`](Self::bucket_for_frequency)
    /// while still landing on a bar whose range holds the tone's bin.
    pub fn resolved_frequency(&self) -> f64 {
        let min = f64::from(self.min_frequency);
        let bin_width = f64::from(self.sample_rate) / self.fft_length as f64;
        let ratio = (self.max_frequency() / min).powf(1.0 / self.bar_count as f64);
        (bin_width / (ratio - 1.0)).max(min)
    }

    /// Edge frequencies of every bar, for labelling.
    pub fn frequencies(&self) -> Vec<(f32, f32)> {
        (0..self.bar_count)
            .map(|b| {
                let (lo, hi) = self.frequency_range(b);
                (lo as f32, hi as f32)
            })
            .collect()
    }
}
