use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
}

/// Settings of the windowed FFT and the bar bucketing.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_fft_length")]
    pub fft_length: usize,
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f32,
    #[serde(default = "default_min_db")]
    pub min_db: f32,
    #[serde(default = "default_max_db")]
    pub max_db: f32,
    /// Exponent applied to the normalized dB value; below 1 lifts quiet bars.
    #[serde(default = "default_gamma")]
    pub gamma: f32,
}

/// Settings of the bar easing.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_attack_speed")]
    pub attack_speed: f32,
    #[serde(default = "default_release_speed")]
    pub release_speed: f32,
    #[serde(default = "default_max_step")]
    pub max_step: f32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Distance between target and current below which a bar counts as settled.
    #[serde(default = "default_settle_tolerance")]
    pub settle_tolerance: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_length: default_fft_length(),
            bar_count: default_bar_count(),
            min_frequency: default_min_frequency(),
            min_db: default_min_db(),
            max_db: default_max_db(),
            gamma: default_gamma(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            attack_speed: default_attack_speed(),
            release_speed: default_release_speed(),
            max_step: default_max_step(),
            tick_interval_ms: default_tick_interval_ms(),
            settle_tolerance: default_settle_tolerance(),
        }
    }
}

fn default_fft_length() -> usize { 2048 }
fn default_bar_count() -> usize { 48 }
fn default_min_frequency() -> f32 { 20.0 }
fn default_min_db() -> f32 { -80.0 }
fn default_max_db() -> f32 { 0.0 }
fn default_gamma() -> f32 { 0.8 }
fn default_attack_speed() -> f32 { 0.28 }
fn default_release_speed() -> f32 { 0.18 }
fn default_max_step() -> f32 { 0.15 }
fn default_tick_interval_ms() -> u64 { 25 }
fn default_settle_tolerance() -> f32 { 0.0005 }

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.fft_length;
        if n < 4 || !n.is_power_of_two() {
            return Err(ConfigError::FftLengthNotPowerOfTwo(n));
        }
        if self.bar_count == 0 {
            return Err(ConfigError::ZeroBarCount);
        }
        if self.bar_count > n / 2 {
            return Err(ConfigError::TooManyBars {
                bars: self.bar_count,
                bins: n / 2,
            });
        }
        if !self.min_frequency.is_finite() || self.min_frequency <= 0.0 {
            return Err(ConfigError::InvalidFrequency(self.min_frequency));
        }
        if !self.min_db.is_finite() || !self.max_db.is_finite() || self.min_db >= self.max_db {
            return Err(ConfigError::InvalidDbRange {
                min_db: self.min_db,
                max_db: self.max_db,
            });
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(ConfigError::InvalidGamma(self.gamma));
        }
        Ok(())
    }
}

impl AnimationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("attack_speed", self.attack_speed),
            ("release_speed", self.release_speed),
            ("max_step", self.max_step),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidSpeed { name, value });
            }
        }
        if !self.settle_tolerance.is_finite() || self.settle_tolerance <= 0.0 {
            return Err(ConfigError::InvalidSettleTolerance(self.settle_tolerance));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analyzer.validate()?;
        self.animation.validate()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Explicit path first, then `./barviz.toml`, then the per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("barviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("barviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("barviz").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
