use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "barviz", about = "Spectrum bar analyzer for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Write JSON lines here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (TOML). Flags given on the command line override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of bars [default: 48, or the config file's bar_count]
    #[arg(long)]
    pub bars: Option<usize>,

    /// FFT window length, a power of two [default: 2048, or the config file's fft_length]
    #[arg(long)]
    pub fft_length: Option<usize>,

    /// Lowest frequency shown, in Hz [default: 20, or the config file's min_frequency]
    #[arg(long)]
    pub min_frequency: Option<f32>,

    /// Animation tick interval in milliseconds [default: 25, or the config file's tick_interval_ms]
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Pace decoding in real time and tick from a separate thread
    #[arg(long)]
    pub realtime: bool,

    /// Omit frames where the bars have settled
    #[arg(long)]
    pub skip_idle: bool,

    /// Print the frequency range of each bar and exit
    #[arg(long)]
    pub print_buckets: bool,

    /// Sample rate assumed by --print-buckets
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,
}
