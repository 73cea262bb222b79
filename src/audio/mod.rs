//! Sample sources and the spectrum tap that analyzes them.

pub mod analysis;
pub mod buckets;
pub mod decode;
pub mod tap;

pub use analysis::SpectrumAnalyzer;
pub use buckets::BucketLayout;
pub use tap::{SpectrumTap, WindowAccumulator};

/// Pull-based stream of interleaved `f32` samples.
///
/// `read` fills the front of `buf` and returns how many samples it wrote;
/// zero means the stream has nothing more to give right now.
pub trait SampleSource {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn read(&mut self, buf: &mut [f32]) -> usize;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self, buf: &mut [f32]) -> usize {
        (**self).read(buf)
    }
}

/// In-memory interleaved samples served in order.
#[derive(Debug, Clone)]
pub struct BufferSource {
    samples: Vec<f32>,
    pos: usize,
    channels: usize,
    sample_rate: u32,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            pos: 0,
            channels,
            sample_rate,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

impl SampleSource for BufferSource {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [f32]) -> usize {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}
