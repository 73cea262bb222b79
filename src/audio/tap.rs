use std::panic::{self, AssertUnwindSafe};

use super::analysis::SpectrumAnalyzer;
use super::SampleSource;
use crate::config::AnalyzerConfig;
use crate::error::ConfigError;

/// Receives the bar values of every completed analysis window.
pub type WindowCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Fixed-size mono buffer with 50% overlap-save.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    buffer: Vec<f32>,
    pos: usize,
}

impl WindowAccumulator {
    pub fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    /// Appends one sample and reports whether the window is now full.
    pub fn push(&mut self, sample: f32) -> bool {
        if self.pos < self.buffer.len() {
            self.buffer[self.pos] = sample;
            self.pos += 1;
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pos >= self.buffer.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn window(&self) -> &[f32] {
        &self.buffer
    }

    /// Moves the second half to the front and continues writing at N/2.
    pub fn advance(&mut self) {
        let half = self.buffer.len() / 2;
        self.buffer.copy_within(half.., 0);
        self.pos = half;
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Pass-through [`SampleSource`] that analyzes everything read through it.
///
/// The samples handed back by `read` are exactly those the wrapped source
/// produced. Each complete interleaved frame is averaged to mono and fed to a
/// [`WindowAccumulator`]; whenever the window fills, the analyzer runs inline
/// and the callback receives the bar values.
pub struct SpectrumTap<S> {
    source: S,
    accumulator: WindowAccumulator,
    analyzer: SpectrumAnalyzer,
    bars: Vec<f32>,
    callback: WindowCallback,
    channels: usize,
    frame_sum: f32,
    frame_fill: usize,
    windows: u64,
    callback_failures: u64,
}

impl<S: SampleSource> SpectrumTap<S> {
    pub fn new(
        source: S,
        config: &AnalyzerConfig,
        callback: WindowCallback,
    ) -> Result<Self, ConfigError> {
        let channels = source.channels();
        if channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        let analyzer = SpectrumAnalyzer::new(config, source.sample_rate())?;
        let bars = vec![0.0; analyzer.bar_count()];

        Ok(Self {
            accumulator: WindowAccumulator::new(analyzer.fft_length()),
            analyzer,
            bars,
            callback,
            channels,
            frame_sum: 0.0,
            frame_fill: 0,
            windows: 0,
            callback_failures: 0,
            source,
        })
    }

    /// Number of windows analyzed since construction or the last reset.
    pub fn windows_analyzed(&self) -> u64 {
        self.windows
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Clears the window and any partial frame; the next analysis needs a full N samples.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.frame_sum = 0.0;
        self.frame_fill = 0;
        self.windows = 0;
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn accumulate(&mut self, samples: &[f32]) {
        let channels = self.source.channels().max(1);
        if channels != self.channels {
            log::debug!(
                "Source channel count changed {} -> {}, dropping partial frame",
                self.channels,
                channels
            );
            self.channels = channels;
            self.frame_sum = 0.0;
            self.frame_fill = 0;
        }

        for &sample in samples {
            self.frame_sum += sample;
            self.frame_fill += 1;
            if self.frame_fill < self.channels {
                continue;
            }

            let mono = self.frame_sum / self.channels as f32;
            self.frame_sum = 0.0;
            self.frame_fill = 0;

            if self.accumulator.push(mono) {
                self.on_window_full();
            }
        }
    }

    fn on_window_full(&mut self) {
        self.analyzer
            .analyze_into(self.accumulator.window(), &mut self.bars);
        self.windows += 1;

        let callback = &mut self.callback;
        let bars = &self.bars;
        if panic::catch_unwind(AssertUnwindSafe(|| callback(bars))).is_err() {
            self.callback_failures += 1;
            if self.callback_failures == 1 {
                log::warn!("Spectrum callback panicked; ignoring and continuing playback");
            } else {
                log::debug!("Spectrum callback panicked ({} times)", self.callback_failures);
            }
        }

        self.accumulator.advance();
    }
}

impl<S: SampleSource> SampleSource for SpectrumTap<S> {
    fn channels(&self) -> usize {
        self.source.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn read(&mut self, buf: &mut [f32]) -> usize {
        let n = self.source.read(buf);
        self.accumulate(&buf[..n]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSource;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn small_config() -> AnalyzerConfig {
        AnalyzerConfig {
            fft_length: 64,
            bar_count: 8,
            ..Default::default()
        }
    }

    fn signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| ((i as f32) * 0.37).sin() * 0.6 + ((i * 13 % 7) as f32 - 3.0) * 0.01)
            .collect()
    }

    fn recorder() -> (Arc<Mutex<Vec<Vec<f32>>>>, WindowCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: WindowCallback = Box::new(move |bars: &[f32]| sink.lock().push(bars.to_vec()));
        (seen, callback)
    }

    /// Returns at most `chunk` samples per read.
    struct Trickle {
        inner: BufferSource,
        chunk: usize,
    }

    impl SampleSource for Trickle {
        fn channels(&self) -> usize {
            self.inner.channels()
        }
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }
        fn read(&mut self, buf: &mut [f32]) -> usize {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }
    }

    /// Reports `before` channels for the first `switch_at` samples, then `after`.
    struct Switching {
        inner: BufferSource,
        read_so_far: usize,
        switch_at: usize,
        before: usize,
        after: usize,
    }

    impl SampleSource for Switching {
        fn channels(&self) -> usize {
            if self.read_so_far <= self.switch_at {
                self.before
            } else {
                self.after
            }
        }
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }
        fn read(&mut self, buf: &mut [f32]) -> usize {
            let n = self.inner.read(buf);
            self.read_so_far += n;
            n
        }
    }

    fn drain<S: SampleSource>(tap: &mut SpectrumTap<S>, chunk: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut buf = vec![0.0; chunk];
        loop {
            let n = tap.read(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn accumulator_overlap_keeps_second_half() {
        let mut acc = WindowAccumulator::new(8);
        for i in 0..7 {
            assert!(!acc.push(i as f32));
        }
        assert!(acc.push(7.0));
        let first = acc.window().to_vec();

        acc.advance();
        assert_eq!(acc.position(), 4);
        for i in 8..12 {
            acc.push(i as f32);
        }
        assert!(acc.is_full());
        assert_eq!(&acc.window()[..4], &first[4..]);
        assert_eq!(acc.window(), &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn accumulator_reset_clears_position() {
        let mut acc = WindowAccumulator::new(4);
        acc.push(1.0);
        acc.push(2.0);
        acc.reset();
        assert_eq!(acc.position(), 0);
        assert!(acc.window().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tap_is_value_transparent() {
        let samples = signal(1000);
        let source = BufferSource::new(samples.clone(), 2, 8000);
        let (_, callback) = recorder();
        let mut tap = SpectrumTap::new(source, &small_config(), callback).unwrap();

        assert_eq!(drain(&mut tap, 37), samples);
        assert_eq!(tap.source().remaining(), 0);
    }

    #[test]
    fn boxed_sources_can_be_tapped() {
        let source: Box<dyn SampleSource + Send> =
            Box::new(BufferSource::new(signal(64 * 2), 2, 8000));
        let (seen, callback) = recorder();
        let mut tap = SpectrumTap::new(source, &small_config(), callback).unwrap();
        assert_eq!(tap.channels(), 2);
        assert_eq!(tap.analyzer().fft_length(), 64);

        let out = drain(&mut tap, 40);
        assert_eq!(out, signal(64 * 2));
        assert_eq!(seen.lock().len(), 1);

        let mut inner = tap.into_inner();
        let mut buf = [0.0f32; 8];
        assert_eq!(inner.read(&mut buf), 0);
    }

    #[test]
    fn windows_fire_every_half_window() {
        // 64 to fill, then one analysis per 32 further mono samples.
        let source = BufferSource::new(signal(64 + 32 * 3 + 10), 1, 8000);
        let (seen, callback) = recorder();
        let mut tap = SpectrumTap::new(source, &small_config(), callback).unwrap();
        drain(&mut tap, 50);

        assert_eq!(tap.windows_analyzed(), 4);
        assert_eq!(seen.lock().len(), 4);
        assert!(seen.lock().iter().all(|bars| bars.len() == 8));
    }

    #[test]
    fn consecutive_windows_overlap_by_half() {
        let mono = signal(64 + 32);
        let config = small_config();
        let (seen, callback) = recorder();
        let source = BufferSource::new(mono.clone(), 1, 8000);
        let mut tap = SpectrumTap::new(source, &config, callback).unwrap();
        drain(&mut tap, 16);

        let mut reference = SpectrumAnalyzer::new(&config, 8000).unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], reference.analyze(&mono[..64]));
        assert_eq!(seen[1], reference.analyze(&mono[32..96]));
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mono = signal(128);
        let config = small_config();

        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s * 1.5, s * 0.5]).collect();
        let (seen, callback) = recorder();
        let mut tap =
            SpectrumTap::new(BufferSource::new(stereo, 2, 8000), &config, callback).unwrap();
        drain(&mut tap, 64);

        let mut reference = SpectrumAnalyzer::new(&config, 8000).unwrap();
        let expected = reference.analyze(&mono[..64]);
        let seen = seen.lock();
        for (a, b) in seen[0].iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn opposite_channels_cancel_to_silence() {
        let mono = signal(64);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, -s]).collect();
        let (seen, callback) = recorder();
        let mut tap =
            SpectrumTap::new(BufferSource::new(stereo, 2, 8000), &small_config(), callback)
                .unwrap();
        drain(&mut tap, 64);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn frames_split_across_reads_are_completed() {
        let mono = signal(96);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
        let config = small_config();

        let (whole, callback) = recorder();
        let mut tap = SpectrumTap::new(BufferSource::new(stereo.clone(), 2, 8000), &config, callback)
            .unwrap();
        drain(&mut tap, 64);

        // Odd chunk sizes cut every other frame in half.
        let trickle = Trickle {
            inner: BufferSource::new(stereo, 2, 8000),
            chunk: 3,
        };
        let (split, callback) = recorder();
        let mut tap = SpectrumTap::new(trickle, &config, callback).unwrap();
        drain(&mut tap, 64);

        assert_eq!(*whole.lock(), *split.lock());
        assert_eq!(split.lock().len(), 2);
    }

    #[test]
    fn channel_change_recomputes_divisor() {
        // 32 stereo frames followed by 32 mono samples fill exactly one window.
        let mut samples: Vec<f32> = (0..32).flat_map(|_| [0.25, 0.75]).collect();
        samples.extend(std::iter::repeat(0.5).take(32));
        let source = Switching {
            inner: BufferSource::new(samples, 2, 8000),
            read_so_far: 0,
            switch_at: 64,
            before: 2,
            after: 1,
        };
        let (seen, callback) = recorder();
        let mut tap = SpectrumTap::new(source, &small_config(), callback).unwrap();

        let mut buf = [0.0; 64];
        assert_eq!(tap.read(&mut buf), 64);
        assert_eq!(tap.windows_analyzed(), 0);
        assert_eq!(tap.read(&mut buf[..32]), 32);
        assert_eq!(tap.windows_analyzed(), 1);

        // Every mono sample was 0.5, so the window is a constant.
        let mut reference = SpectrumAnalyzer::new(&small_config(), 8000).unwrap();
        assert_eq!(seen.lock()[0], reference.analyze(&[0.5; 64]));
    }

    #[test]
    fn empty_reads_are_harmless() {
        let (_, callback) = recorder();
        let mut tap =
            SpectrumTap::new(BufferSource::new(Vec::new(), 1, 8000), &small_config(), callback)
                .unwrap();
        let mut buf = [0.0; 16];
        assert_eq!(tap.read(&mut buf), 0);
        assert_eq!(tap.read(&mut []), 0);
        assert_eq!(tap.windows_analyzed(), 0);
    }

    #[test]
    fn panicking_callback_does_not_stop_samples() {
        let samples = signal(256);
        let callback: WindowCallback = Box::new(|_| panic!("renderer went away"));
        let mut tap = SpectrumTap::new(
            BufferSource::new(samples.clone(), 1, 8000),
            &small_config(),
            callback,
        )
        .unwrap();

        assert_eq!(drain(&mut tap, 40), samples);
        assert_eq!(tap.windows_analyzed(), 7);
    }

    #[test]
    fn reset_discards_partial_window() {
        let (seen, callback) = recorder();
        let mut tap = SpectrumTap::new(
            BufferSource::new(signal(64 + 63), 1, 8000),
            &small_config(),
            callback,
        )
        .unwrap();

        let mut buf = [0.0; 63];
        tap.read(&mut buf);
        tap.reset();
        tap.read(&mut buf);
        assert_eq!(tap.windows_analyzed(), 0);
        let mut one = [0.0; 1];
        tap.read(&mut one);
        assert_eq!(tap.windows_analyzed(), 1);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn rejects_zero_channels() {
        let (_, callback) = recorder();
        let err = SpectrumTap::new(BufferSource::new(vec![], 0, 8000), &small_config(), callback)
            .err();
        assert_eq!(err, Some(ConfigError::ZeroChannels));
    }
}
