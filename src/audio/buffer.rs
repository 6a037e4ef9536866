use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decoded PCM audio, immutable and cheap to clone.
///
/// Clones share the same sample storage; [`AudioBuffer::ptr_eq`] tells whether
/// two handles point at the same decoded instance.
#[derive(Clone)]
pub struct AudioBuffer {
    inner: Arc<BufferData>,
}

struct BufferData {
    /// Interleaved samples
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(BufferData {
                samples,
                channels: channels.max(1),
                sample_rate,
            }),
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::from_interleaved(samples, 1, sample_rate)
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    /// Number of sample frames (one sample per channel each)
    pub fn frames(&self) -> usize {
        self.inner.samples.len() / self.inner.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.inner.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.inner.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Left/right pair of a frame. Mono is duplicated; channels past the
    /// second are ignored.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        let channels = self.inner.channels as usize;
        let base = frame * channels;
        match self.inner.samples.get(base..base + channels) {
            Some([mono]) => (*mono, *mono),
            Some([left, right, ..]) => (*left, *right),
            _ => (0.0, 0.0),
        }
    }

    /// Copy out one channel as a new mono buffer.
    pub fn channel(&self, channel: u16) -> Option<AudioBuffer> {
        if channel >= self.inner.channels {
            return None;
        }
        let samples = self
            .inner
            .samples
            .iter()
            .skip(channel as usize)
            .step_by(self.inner.channels as usize)
            .copied()
            .collect();
        Some(AudioBuffer::mono(samples, self.inner.sample_rate))
    }

    pub fn peak(&self) -> f32 {
        self.inner
            .samples
            .iter()
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
    }

    pub fn ptr_eq(a: &AudioBuffer, b: &AudioBuffer) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.inner.channels)
            .field("sample_rate", &self.inner.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}
