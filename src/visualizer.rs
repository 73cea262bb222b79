use std::sync::Arc;

use crate::audio::tap::WindowCallback;
use crate::audio::{BucketLayout, SampleSource, SpectrumTap};
use crate::bars::{AnimationEngine, BarStore, FrameCallback, Ticker};
use crate::config::Config;
use crate::error::ConfigError;

/// Wires taps, the shared bar store and the animation engine together.
///
/// One `Visualizer` lives as long as the player. Each track gets its own
/// [`SpectrumTap`] from [`attach`](Self::attach); the store and its bars carry
/// over between tracks so they can decay instead of jumping to zero.
pub struct Visualizer {
    config: Config,
    store: Arc<BarStore>,
    engine: AnimationEngine,
}

impl Visualizer {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = AnimationEngine::new(config.animation.clone())?;
        let store = Arc::new(BarStore::new(config.analyzer.bar_count));
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<BarStore> {
        &self.store
    }

    pub fn engine(&self) -> &AnimationEngine {
        &self.engine
    }

    pub fn bar_count(&self) -> usize {
        self.store.bar_count()
    }

    pub fn layout(&self, sample_rate: u32) -> BucketLayout {
        BucketLayout::new(&self.config.analyzer, sample_rate)
    }

    /// Wraps `source` in a tap publishing into this visualizer's store.
    pub fn attach<S: SampleSource>(&self, source: S) -> Result<SpectrumTap<S>, ConfigError> {
        let store = self.store.clone();
        self.attach_tap(source, Box::new(move |bars: &[f32]| store.publish_targets(bars)))
    }

    /// Like [`attach`](Self::attach), additionally handing every window's bars to `observer`.
    pub fn attach_with<S: SampleSource>(
        &self,
        source: S,
        mut observer: WindowCallback,
    ) -> Result<SpectrumTap<S>, ConfigError> {
        let store = self.store.clone();
        self.attach_tap(
            source,
            Box::new(move |bars: &[f32]| {
                store.publish_targets(bars);
                observer(bars);
            }),
        )
    }

    fn attach_tap<S: SampleSource>(
        &self,
        source: S,
        callback: WindowCallback,
    ) -> Result<SpectrumTap<S>, ConfigError> {
        let tap = SpectrumTap::new(source, &self.config.analyzer, callback)?;
        log::info!(
            "Spectrum tap attached: {} Hz, {} ch, fft {} -> {} bars",
            tap.sample_rate(),
            tap.channels(),
            self.config.analyzer.fft_length,
            self.config.analyzer.bar_count
        );
        Ok(tap)
    }

    /// One animation step; `true` while a redraw is needed.
    pub fn tick(&self) -> bool {
        self.store.tick(&self.engine)
    }

    pub fn snapshot(&self) -> Vec<f32> {
        self.store.snapshot()
    }

    /// Playback stopped: targets drop to zero and the bars ease down.
    pub fn stop(&self) {
        log::info!("Playback stopped, releasing bars");
        self.store.clear_targets();
    }

    /// Hard reset of targets and displayed bars.
    pub fn reset(&self) {
        log::debug!("Bar state reset");
        self.store.reset();
    }

    pub fn spawn_ticker(&self, on_frame: FrameCallback) -> std::io::Result<Ticker> {
        Ticker::spawn(
            self.store.clone(),
            self.engine.clone(),
            self.config.animation.tick_interval(),
            on_frame,
        )
    }
}
