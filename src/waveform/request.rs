use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ExtractorSettings;

/// Parameters for one end-to-end extraction.
///
/// `samples_per_pixel` is signed so a non-positive value read from JSON, TOML or the command
/// line stays representable; it produces an empty waveform rather than a parse error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Audio file handed to the decoder.
    pub path: PathBuf,
    /// Samples per channel reduced into each pixel.
    pub samples_per_pixel: i64,
    /// Rescale pixels after downsampling.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    /// Target peak magnitude after normalization.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Minimum magnitude kept during normalization.
    #[serde(default)]
    pub threshold: f32,
}

fn default_normalize() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

impl ExtractionRequest {
    /// Request with default normalization settings.
    pub fn new(path: impl Into<PathBuf>, samples_per_pixel: i64) -> Self {
        Self {
            path: path.into(),
            samples_per_pixel,
            normalize: default_normalize(),
            scale: default_scale(),
            threshold: 0.0,
        }
    }

    /// Request for `path` seeded from persisted settings.
    pub fn from_settings(path: impl Into<PathBuf>, settings: &ExtractorSettings) -> Self {
        Self {
            path: path.into(),
            samples_per_pixel: settings.samples_per_pixel,
            normalize: settings.normalize,
            scale: settings.scale,
            threshold: settings.threshold,
        }
    }

    /// Parse a JSON request such as `{"path": "a.wav", "samples_per_pixel": 256}`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Window size for the engine; 0 (invalid) when the request value is not positive.
    pub fn window_size(&self) -> usize {
        usize::try_from(self.samples_per_pixel).unwrap_or(0)
    }

    /// Copy with `threshold` clamped into `[0, 1]` and an unusable `scale` reset to 1.0.
    pub fn normalized(mut self) -> Self {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            tracing::warn!("Ignoring invalid scale {}; using 1.0", self.scale);
            self.scale = default_scale();
        }
        if !self.threshold.is_finite() {
            tracing::warn!("Ignoring invalid threshold {}; using 0.0", self.threshold);
            self.threshold = 0.0;
        } else if !(0.0..=1.0).contains(&self.threshold) {
            let clamped = self.threshold.clamp(0.0, 1.0);
            tracing::warn!("Clamping threshold {} to {clamped}", self.threshold);
            self.threshold = clamped;
        }
        self
    }
}
