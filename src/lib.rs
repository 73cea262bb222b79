//! barviz - real-time spectrum bars for audio players.
//!
//! A [`SpectrumTap`](audio::SpectrumTap) sits in the player's sample pipeline,
//! analyzes overlapping FFT windows and publishes bar targets into a shared
//! [`BarStore`](bars::BarStore). A render-side tick eases the displayed bars
//! toward those targets.

pub mod audio;
pub mod bars;
pub mod config;
pub mod error;
pub mod visualizer;

pub use error::ConfigError;
pub use visualizer::Visualizer;
