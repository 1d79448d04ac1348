//! Decoded PCM container

/// Decoded waveform (interleaved f32, normalized to -1.0..=1.0)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
}

impl AudioAsset {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Fold to one channel by averaging each frame
    pub fn into_mono(self) -> AudioAsset {
        if self.channels <= 1 {
            return AudioAsset::mono(self.samples, self.sample_rate);
        }

        let channels = self.channels as usize;
        let folded = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        AudioAsset::mono(folded, self.sample_rate)
    }

    /// Duplicate a mono signal across `channels` channels
    ///
    /// Multi-channel input is returned unchanged when it already has `channels`
    /// channels; otherwise it is folded to mono first.
    pub fn widen(self, channels: u16) -> AudioAsset {
        if self.channels == channels {
            return self;
        }

        let mono = self.into_mono();
        let width = channels.max(1) as usize;
        let mut samples = Vec::with_capacity(mono.samples.len() * width);
        for &sample in &mono.samples {
            samples.extend(std::iter::repeat(sample).take(width));
        }
        AudioAsset::new(samples, mono.sample_rate, channels.max(1))
    }

    /// Slice of frames `[start, end)`, clamped to the signal
    pub fn frame_slice(&self, start: usize, end: usize) -> &[f32] {
        let channels = self.channels.max(1) as usize;
        let end = end.min(self.frames());
        let start = start.min(end);
        &self.samples[start * channels..end * channels]
    }
}
