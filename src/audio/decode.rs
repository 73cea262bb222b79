use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::SampleSource;

/// Streams interleaved `f32` samples out of an audio file, one packet at a time.
pub struct DecodedSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    pending_pos: usize,
    finished: bool,
}

impl DecodedSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Failed to probe audio format")?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .context("No audio tracks found")?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        log::info!(
            "Opened {}: {}Hz, {} channels",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
            sample_rate,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        })
    }

    /// Total frames if the container reports it.
    pub fn frame_count(&self) -> Option<u64> {
        self.format
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .and_then(|t| t.codec_params.n_frames)
    }

    /// Decodes the next packet of our track into `pending`. Returns false at end of stream.
    fn refill(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return false;
                }
                Err(e) => {
                    log::error!("Failed to read packet: {}", e);
                    return false;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => {
                    log::error!("Decoder failed: {}", e);
                    return false;
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            if num_frames == 0 {
                continue;
            }

            let channels = spec.channels.count();
            if channels != self.channels {
                log::debug!("Stream channel count changed {} -> {}", self.channels, channels);
                self.channels = channels;
            }

            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.extend_from_slice(sample_buf.samples());
            self.pending_pos = 0;
            return true;
        }
    }
}

impl SampleSource for DecodedSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [f32]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            if self.pending_pos >= self.pending.len() {
                // Never mix packets with different layouts in one read.
                if self.finished || written > 0 {
                    break;
                }
                if !self.refill() {
                    self.finished = true;
                    break;
                }
            }
            let n = (buf.len() - written).min(self.pending.len() - self.pending_pos);
            buf[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            written += n;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(name: &str, channels: u16, sample_rate: u32, frames: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("barviz-{}-{}.wav", name, std::process::id()));
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let v = ((i as f32 * 0.05 + c as f32).sin() * 12000.0) as i16;
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn streams_every_sample_of_a_wav() {
        let path = write_wav("stream", 2, 22050, 5000);
        let mut source = DecodedSource::open(&path).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 22050);
        assert_eq!(source.frame_count(), Some(5000));

        let mut buf = vec![0.0; 777];
        let mut total = 0;
        loop {
            let n = source.read(&mut buf);
            if n == 0 {
                break;
            }
            assert!(buf[..n].iter().all(|s| (-1.0..=1.0).contains(s)));
            total += n;
        }
        assert_eq!(total, 5000 * 2);
        assert_eq!(source.read(&mut buf), 0);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = DecodedSource::open(Path::new("/definitely/not/here.wav")).err().unwrap();
        assert!(err.to_string().contains("Failed to open audio file"));
    }
}
