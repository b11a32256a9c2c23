pub mod backend;
pub mod bridge;
pub mod chunk;
pub mod file;
pub mod output;
pub mod pcm;

#[cfg(feature = "backend-cpal")]
pub mod cpal;

pub use backend::{
    AudioBackendFactory, AudioFrame, AudioSource, CaptureBackend, CaptureConstraints,
    DEFAULT_BLOCK_SIZE, SAMPLE_RATE,
};
pub use bridge::AudioBridge;
pub use chunk::{FrameAssembler, FrameChunker, LinearResampler};
pub use file::{AudioFile, FileCapture};
pub use output::{DiscardOutput, OutputContext, OutputDevice, OutputStream};
