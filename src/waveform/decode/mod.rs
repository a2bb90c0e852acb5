mod symphonia_reader;
mod wav_reader;

use std::path::Path;

use crate::waveform::{CancellationFlag, DecodeError};

/// Largest file the default decoder will read into memory.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 512 * 1024 * 1024;

/// Interleaved samples produced by a decoder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in roughly `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of complete frames in the buffer.
    pub fn frame_count(&self) -> usize {
        match self.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.frame_count() as f32 / self.sample_rate.max(1) as f32
    }
}

/// Source of decoded sample buffers for an extraction session.
///
/// Implementations should poll `cancel` while decoding and return [`DecodeError::Aborted`]
/// once it is set, so long files stop promptly.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path, cancel: &CancellationFlag) -> Result<DecodedAudio, DecodeError>;
}

/// File decoder: WAV through `hound`, everything else probed through `symphonia`.
#[derive(Clone, Debug)]
pub struct FileDecoder {
    max_file_bytes: u64,
}

impl Default for FileDecoder {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl FileDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the maximum accepted file size.
    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes.max(1);
        self
    }

    /// Decode an in-memory file image; `hint` is an optional extension such as `"flac"`.
    ///
    /// Takes the image by value so the symphonia fallback can stream it without a copy.
    pub fn decode_bytes(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<DecodedAudio, DecodeError> {
        if let Some(decoded) = wav_reader::decode_wav(&bytes, cancel)? {
            return Ok(decoded);
        }
        symphonia_reader::decode_with_symphonia(bytes, hint, cancel)
    }
}

impl AudioDecoder for FileDecoder {
    fn decode(&self, path: &Path, cancel: &CancellationFlag) -> Result<DecodedAudio, DecodeError> {
        if cancel.is_cancelled() {
            return Err(DecodeError::Aborted);
        }
        let metadata = std::fs::metadata(path).map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() > self.max_file_bytes {
            return Err(DecodeError::TooLarge {
                path: path.to_path_buf(),
                bytes: metadata.len(),
                limit: self.max_file_bytes,
            });
        }
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let hint = path.extension().and_then(|ext| ext.to_str());
        let decoded = self.decode_bytes(bytes, hint, cancel)?;
        if decoded.samples.is_empty() {
            return Err(DecodeError::Empty {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(
            "Decoded {} ({} frames, {} ch, {} Hz)",
            path.display(),
            decoded.frame_count(),
            decoded.channels,
            decoded.sample_rate
        );
        Ok(decoded)
    }
}
