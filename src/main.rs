mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use barviz::audio::decode::DecodedSource;
use barviz::audio::{BucketLayout, SampleSource, SpectrumTap};
use barviz::config::{self, Config};
use barviz::Visualizer;
use cli::Cli;

/// Frames pulled per read by the realtime audio thread.
const REALTIME_CHUNK_FRAMES: usize = 1024;

/// One line of output.
#[derive(Serialize)]
struct BarFrame<'a> {
    time: f32,
    dirty: bool,
    bars: &'a [f32],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    config.validate().context("Invalid configuration")?;

    if cli.print_buckets {
        print_buckets(&BucketLayout::new(&config.analyzer, cli.sample_rate));
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("barviz - spectrum bar analyzer");
    log::info!("Input: {}", input.display());
    log::info!(
        "Bars: {}, FFT: {}, min freq: {} Hz, tick: {} ms",
        config.analyzer.bar_count,
        config.analyzer.fft_length,
        config.analyzer.min_frequency,
        config.animation.tick_interval_ms
    );

    let visualizer = Visualizer::new(config)?;
    let source = DecodedSource::open(input)?;

    let out: Box<dyn Write + Send> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    if cli.realtime {
        run_realtime(&visualizer, source, out, cli.skip_idle)?;
    } else {
        let progress = cli.output.is_some();
        run_offline(&visualizer, source, out, cli.skip_idle, progress)?;
    }

    if let Some(ref path) = cli.output {
        log::info!("Done! Output: {}", path.display());
    }
    Ok(())
}

/// Config file values, overridden by any numeric flag given on the command line.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) if cli.config.is_some() => return Err(err),
            Err(err) => {
                log::warn!("Ignoring config: {:#}", err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    apply_overrides(cli, &mut cfg);
    Ok(cfg)
}

fn apply_overrides(cli: &Cli, cfg: &mut Config) {
    if let Some(bars) = cli.bars { cfg.analyzer.bar_count = bars; }
    if let Some(n) = cli.fft_length { cfg.analyzer.fft_length = n; }
    if let Some(freq) = cli.min_frequency { cfg.analyzer.min_frequency = freq; }
    if let Some(ms) = cli.tick_ms { cfg.animation.tick_interval_ms = ms; }
}

fn print_buckets(layout: &BucketLayout) {
    println!("{:>4}  {:>10}  {:>10}  {:>11}", "bar", "from Hz", "to Hz", "bins");
    for (b, (lo, hi)) in layout.frequencies().into_iter().enumerate() {
        let bins = layout.range(b);
        println!(
            "{:>4}  {:>10.1}  {:>10.1}  {:>5}..{:<5}",
            b, lo, hi, bins.start, bins.end
        );
    }
    println!(
        "bars below {:.1} Hz are narrower than one FFT bin and share bins",
        layout.resolved_frequency()
    );
}

fn write_frame(out: &mut dyn Write, frame: &BarFrame) -> Result<()> {
    serde_json::to_writer(&mut *out, frame)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Decodes as fast as possible, ticking once per `tick_interval` of audio.
fn run_offline(
    visualizer: &Visualizer,
    source: DecodedSource,
    mut out: Box<dyn Write + Send>,
    skip_idle: bool,
    show_progress: bool,
) -> Result<()> {
    let sample_rate = source.sample_rate();
    let total_frames = source.frame_count();
    let tick = visualizer.config().animation.tick_interval();
    let tick_secs = tick.as_secs_f32();
    let frames_per_tick = ((f64::from(sample_rate) * tick.as_secs_f64()).round() as usize).max(1);

    let mut tap = visualizer.attach(source)?;

    let pb = match (show_progress, total_frames) {
        (true, Some(total)) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
                    .progress_chars("=>-"),
            );
            pb
        }
        _ => ProgressBar::hidden(),
    };

    let mut buf = Vec::new();
    let mut frames_read = 0u64;
    let mut ticks = 0u64;

    loop {
        let channels = tap.channels().max(1);
        buf.resize(frames_per_tick * channels, 0.0);

        let mut filled = 0;
        while filled < buf.len() {
            let n = tap.read(&mut buf[filled..]);
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        frames_read += (filled / channels) as u64;

        let dirty = visualizer.tick();
        ticks += 1;
        if dirty || !skip_idle {
            let bars = visualizer.snapshot();
            write_frame(&mut out, &BarFrame { time: ticks as f32 * tick_secs, dirty, bars: &bars })?;
        }
        pb.set_position(frames_read);
    }
    pb.finish_and_clear();

    log::info!(
        "Analyzed {} windows over {} frames ({:.1}s)",
        tap.windows_analyzed(),
        frames_read,
        frames_read as f32 / sample_rate as f32
    );

    // Let the bars fall back to zero after the last sample.
    visualizer.stop();
    let tail = visualizer.engine().ticks_to_settle(1.0, 0.0) + 1;
    for _ in 0..tail {
        let dirty = visualizer.tick();
        ticks += 1;
        if dirty || !skip_idle {
            let bars = visualizer.snapshot();
            write_frame(&mut out, &BarFrame { time: ticks as f32 * tick_secs, dirty, bars: &bars })?;
        }
        if !dirty {
            break;
        }
    }

    out.flush()?;
    Ok(())
}

/// Audio thread paced to real time, render ticks on a [`barviz::bars::Ticker`].
fn run_realtime(
    visualizer: &Visualizer,
    source: DecodedSource,
    out: Box<dyn Write + Send>,
    skip_idle: bool,
) -> Result<()> {
    let sample_rate = source.sample_rate();
    let tap = visualizer.attach(source)?;

    let out = Arc::new(Mutex::new(out));
    let sink = out.clone();
    let start = Instant::now();
    let mut ticker = visualizer
        .spawn_ticker(Box::new(move |bars: &[f32], dirty: bool| {
            if skip_idle && !dirty {
                return;
            }
            let frame = BarFrame {
                time: start.elapsed().as_secs_f32(),
                dirty,
                bars,
            };
            if let Err(err) = write_frame(&mut **sink.lock(), &frame) {
                log::warn!("Failed to write frame: {:#}", err);
            }
        }))
        .context("Failed to start ticker thread")?;

    let audio = thread::Builder::new()
        .name("audio-pull".to_string())
        .spawn(move || pull_realtime(tap, sample_rate))
        .context("Failed to start audio thread")?;
    let (frames, windows) = audio
        .join()
        .map_err(|_| anyhow::anyhow!("Audio thread panicked"))?;

    log::info!("Played {} frames, {} windows analyzed", frames, windows);

    visualizer.stop();
    let settle = visualizer.engine().ticks_to_settle(1.0, 0.0) as u32;
    thread::sleep(visualizer.config().animation.tick_interval() * settle);
    let ticks = ticker.stop();
    log::info!("Rendered {} ticks", ticks);

    out.lock().flush()?;
    Ok(())
}

fn pull_realtime<S: SampleSource>(mut tap: SpectrumTap<S>, sample_rate: u32) -> (u64, u64) {
    let mut buf = Vec::new();
    let mut frames = 0u64;
    let start = Instant::now();

    loop {
        let channels = tap.channels().max(1);
        buf.resize(REALTIME_CHUNK_FRAMES * channels, 0.0);
        let n = tap.read(&mut buf);
        if n == 0 {
            break;
        }
        frames += (n / channels) as u64;

        let due = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate));
        if let Some(wait) = due.checked_sub(start.elapsed()) {
            thread::sleep(wait);
        }
    }

    (frames, tap.windows_analyzed())
}
