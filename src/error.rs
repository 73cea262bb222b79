use thiserror::Error;

/// Rejected analyzer, animation or stream settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("FFT length must be a power of two >= 4, got {0}")]
    FftLengthNotPowerOfTwo(usize),

    #[error("bar count must be at least 1")]
    ZeroBarCount,

    #[error("{bars} bars requested but the FFT only yields {bins} usable bins")]
    TooManyBars { bars: usize, bins: usize },

    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("channel count must be greater than zero")]
    ZeroChannels,

    #[error("minimum frequency must be a positive finite number, got {0}")]
    InvalidFrequency(f32),

    #[error("dB range is empty: min_db {min_db} must be below max_db {max_db}")]
    InvalidDbRange { min_db: f32, max_db: f32 },

    #[error("{name} must lie in (0, 1], got {value}")]
    InvalidSpeed { name: &'static str, value: f32 },

    #[error("gamma must be a positive finite number, got {0}")]
    InvalidGamma(f32),

    #[error("settle tolerance must be a positive finite number, got {0}")]
    InvalidSettleTolerance(f32),

    #[error("tick interval must be at least 1 ms")]
    ZeroTickInterval,
}
