//! Amplitude envelope extraction: decode audio, reduce it to one peak per pixel, normalize.

mod cancel;
mod decode;
mod downsample;
mod error;
mod normalize;
pub mod peak;
mod progress;
mod request;
mod session;

use serde::Serialize;

pub use cancel::CancellationFlag;
pub use decode::{AudioDecoder, DEFAULT_MAX_FILE_BYTES, DecodedAudio, FileDecoder};
pub use downsample::{
    CANCEL_CHECK_INTERVAL, Downsampler, ExecutionMode, ExtractionParameters,
    available_parallelism, downsample, partition_pixels,
};
pub use error::{DecodeError, ExtractError};
pub use normalize::{normalize, normalize_in_place, peak_above_threshold};
pub use peak::PeakKernel;
pub use progress::{AtomicProgress, ProgressCallback, ProgressSink};
pub use request::ExtractionRequest;
pub use session::{
    ExtractionSession, ExtractionState, PROGRESS_DECODING, PROGRESS_NORMALIZING,
    PROGRESS_PROCESSING,
};

/// Per-channel peak envelopes, one value per pixel.
///
/// Every channel holds the same number of pixels. An empty value means either that there was
/// nothing to compute or that the run was cancelled.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WaveformData {
    channels: Vec<Vec<f32>>,
}

impl WaveformData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there are no channels or no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixels_per_channel() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn pixels_per_channel(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Normalize every channel in place; see [`normalize`].
    pub fn normalize(&mut self, scale: f32, threshold: f32) {
        normalize_in_place(&mut self.channels, scale, threshold);
    }
}

impl From<Vec<Vec<f32>>> for WaveformData {
    fn from(channels: Vec<Vec<f32>>) -> Self {
        Self { channels }
    }
}
