// Capture-side frame assembly
//
// Device callbacks deliver buffers of arbitrary length at the device's native
// rate and channel count. The session expects fixed-size mono frames at the
// wire rate, so each callback buffer is downmixed, resampled and then cut into
// `block_size` frames. Leftover samples are carried into the next callback.

use super::backend::AudioFrame;

/// Average interleaved channels into a single mono channel
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Streaming linear-interpolation resampler
///
/// Keeps the fractional read position and the last input sample between calls
/// so consecutive buffers join without a discontinuity.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    step: f64,
    position: f64,
    previous: Option<f32>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            step: from_rate.max(1) as f64 / to_rate.max(1) as f64,
            position: 1.0,
            previous: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.step == 1.0
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        // index 0 is the previous buffer's last sample, index i + 1 is input[i]
        let previous = self.previous.unwrap_or(input[0]);
        let sample_at = |i: usize| if i == 0 { previous } else { input[i - 1] };
        let last_index = input.len();

        let mut output = Vec::with_capacity((input.len() as f64 / self.step) as usize + 1);
        while self.position <= last_index as f64 {
            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            let sample = if index >= last_index {
                sample_at(last_index)
            } else {
                sample_at(index) * (1.0 - frac) + sample_at(index + 1) * frac
            };
            output.push(sample);
            self.position += self.step;
        }

        self.position -= last_index as f64;
        self.previous = input.last().copied();
        output
    }
}

/// Cuts a continuous sample stream into fixed-size frames
#[derive(Debug)]
pub struct FrameChunker {
    block_size: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    samples_emitted: u64,
}

impl FrameChunker {
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            sample_rate,
            pending: Vec::with_capacity(block_size),
            samples_emitted: 0,
        }
    }

    /// Append samples, returning every frame that is now complete
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let mut rest = samples;

        while !rest.is_empty() {
            let take = (self.block_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.block_size {
                let timestamp_ms = self.samples_emitted * 1000 / self.sample_rate.max(1) as u64;
                self.samples_emitted += self.block_size as u64;
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                frames.push(AudioFrame {
                    samples,
                    sample_rate: self.sample_rate,
                    channels: 1,
                    timestamp_ms,
                });
            }
        }

        frames
    }

    /// Samples waiting for the next full frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Device buffer -> wire frame pipeline (downmix, resample, chunk)
#[derive(Debug)]
pub struct FrameAssembler {
    device_channels: u16,
    resampler: LinearResampler,
    chunker: FrameChunker,
}

impl FrameAssembler {
    pub fn new(device_rate: u32, device_channels: u16, target_rate: u32, block_size: usize) -> Self {
        Self {
            device_channels,
            resampler: LinearResampler::new(device_rate, target_rate),
            chunker: FrameChunker::new(block_size, target_rate),
        }
    }

    pub fn push_interleaved(&mut self, interleaved: &[f32]) -> Vec<AudioFrame> {
        let mono = downmix_to_mono(interleaved, self.device_channels);
        let resampled = self.resampler.process(&mono);
        self.chunker.push(&resampled)
    }

    pub fn pending_len(&self) -> usize {
        self.chunker.pending_len()
    }
}
