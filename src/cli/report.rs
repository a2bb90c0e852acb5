use std::path::PathBuf;

use serde::Serialize;
use waveform_extract::waveform::WaveformData;

/// JSON document written for every run, cancelled or not.
#[derive(Clone, Debug, Serialize)]
pub(super) struct ExtractionReport {
    pub(super) version: String,
    pub(super) source: PathBuf,
    pub(super) samples_per_pixel: i64,
    pub(super) channels: usize,
    pub(super) pixels_per_channel: usize,
    pub(super) cancelled: bool,
    pub(super) elapsed_ms: u64,
    pub(super) data: WaveformData,
}

impl ExtractionReport {
    pub(super) fn new(
        source: PathBuf,
        samples_per_pixel: i64,
        cancelled: bool,
        elapsed_ms: u64,
        data: WaveformData,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            source,
            samples_per_pixel,
            channels: data.channel_count(),
            pixels_per_channel: data.pixels_per_channel(),
            cancelled,
            elapsed_ms,
            data,
        }
    }
}
