use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::decode::AudioDecoder;
use super::downsample::{Downsampler, ExtractionParameters};
use super::progress::{AtomicProgress, ProgressCallback};
use super::{CancellationFlag, DecodeError, ExtractError, ExtractionRequest, WaveformData};

/// Progress reported once decoding starts.
pub const PROGRESS_DECODING: f64 = 0.1;
/// Progress reported when downsampling starts.
pub const PROGRESS_PROCESSING: f64 = 0.5;
/// Progress reported when normalization starts.
pub const PROGRESS_NORMALIZING: f64 = 0.8;

/// Where a session is in its decode, downsample, normalize pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtractionState {
    Idle = 0,
    Decoding = 1,
    Processing = 2,
    Normalizing = 3,
    Completed = 4,
    Cancelled = 5,
}

impl ExtractionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Decoding,
            2 => Self::Processing,
            3 => Self::Normalizing,
            4 => Self::Completed,
            5 => Self::Cancelled,
            _ => Self::Idle,
        }
    }

    /// True while an extraction is running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Decoding | Self::Processing | Self::Normalizing)
    }
}

/// Reusable handle that drives one extraction slot through decode, downsample and normalize.
///
/// All methods take `&self`; share the session in an `Arc` to cancel or poll progress from
/// other threads while `extract` runs. Sessions can run any number of extractions one after
/// another: each call starts by clearing the cancellation flag and progress.
pub struct ExtractionSession {
    decoder: Box<dyn AudioDecoder>,
    downsampler: Downsampler,
    cancel: CancellationFlag,
    progress: AtomicProgress,
    state: AtomicU8,
    callback: Mutex<Option<Arc<ProgressCallback>>>,
}

impl ExtractionSession {
    pub fn new(decoder: impl AudioDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            downsampler: Downsampler::default(),
            cancel: CancellationFlag::new(),
            progress: AtomicProgress::default(),
            state: AtomicU8::new(ExtractionState::Idle as u8),
            callback: Mutex::new(None),
        }
    }

    /// Replace the engine configuration used by later extractions.
    pub fn with_downsampler(mut self, downsampler: Downsampler) -> Self {
        self.downsampler = downsampler;
        self
    }

    /// Decode `request.path`, downsample it, and optionally normalize the pixels.
    ///
    /// Returns an empty waveform when cancelled or when there is nothing to compute; only
    /// decoder failures surface as errors.
    pub fn extract(&self, request: &ExtractionRequest) -> Result<WaveformData, ExtractError> {
        self.reset_cancellation();
        self.progress.store(0.0);
        let request = request.clone().normalized();
        let started_at = Instant::now();
        tracing::info!(
            "Extracting waveform from {} ({} samples/pixel)",
            request.path.display(),
            request.samples_per_pixel
        );

        self.enter(ExtractionState::Decoding, PROGRESS_DECODING);
        if self.is_cancelled() {
            return Ok(self.finish_cancelled("before decoding"));
        }
        let decoded = match self.decoder.decode(&request.path, &self.cancel) {
            Ok(decoded) => decoded,
            Err(DecodeError::Aborted) => return Ok(self.finish_cancelled("while decoding")),
            Err(err) => {
                tracing::warn!("Decoding {} failed: {err}", request.path.display());
                self.progress.store(0.0);
                self.set_state(ExtractionState::Idle);
                return Err(err.into());
            }
        };
        if self.is_cancelled() {
            return Ok(self.finish_cancelled("after decoding"));
        }

        self.enter(ExtractionState::Processing, PROGRESS_PROCESSING);
        if self.is_cancelled() {
            return Ok(self.finish_cancelled("before downsampling"));
        }
        let params = ExtractionParameters::new(request.window_size(), decoded.channels as usize);
        let band = PROGRESS_NORMALIZING - PROGRESS_PROCESSING;
        let sink = |value: f64| self.report(PROGRESS_PROCESSING + value * band);
        let mut waveform =
            self.downsampler
                .downsample(&decoded.samples, params, Some(&self.cancel), Some(&sink));
        drop(decoded);
        if self.is_cancelled() {
            return Ok(self.finish_cancelled("after downsampling"));
        }

        self.enter(ExtractionState::Normalizing, PROGRESS_NORMALIZING);
        if request.normalize {
            waveform.normalize(request.scale, request.threshold);
        }
        if self.is_cancelled() {
            return Ok(self.finish_cancelled("after normalizing"));
        }

        // Progress first: a reader that sees Completed also sees 1.0.
        self.progress.store(1.0);
        self.set_state(ExtractionState::Completed);
        self.notify(1.0);
        tracing::info!(
            "Extracted {} channel(s) x {} pixels in {} ms",
            waveform.channel_count(),
            waveform.pixels_per_channel(),
            started_at.elapsed().as_millis()
        );
        Ok(waveform)
    }

    /// Request cancellation of the running extraction. Safe from any thread, at any time.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clear the cancellation flag; `extract` does this itself on entry.
    pub fn reset_cancellation(&self) {
        self.cancel.reset();
    }

    /// Handle to this session's cancellation flag, for timers or other threads.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Current progress in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        self.progress.load()
    }

    pub fn state(&self) -> ExtractionState {
        ExtractionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Register the progress callback, dropping any previous one.
    pub fn on_progress(&self, callback: impl Fn(f64) + Send + Sync + 'static) {
        *self.callback_slot() = Some(Arc::new(callback));
    }

    pub fn clear_progress_callback(&self) {
        *self.callback_slot() = None;
    }

    pub fn has_progress_callback(&self) -> bool {
        self.callback_slot().is_some()
    }

    fn callback_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<ProgressCallback>>> {
        self.callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, state: ExtractionState, progress: f64) {
        tracing::debug!("Extraction entering {state:?}");
        self.set_state(state);
        self.report(progress);
    }

    fn set_state(&self, state: ExtractionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Advance progress and forward the resulting value to the callback.
    fn report(&self, value: f64) {
        let value = self.progress.advance(value);
        self.notify(value);
    }

    fn notify(&self, value: f64) {
        // Clone out of the lock so a callback may re-register or cancel.
        let callback = self.callback_slot().clone();
        if let Some(callback) = callback {
            callback(value);
        }
    }

    fn finish_cancelled(&self, stage: &str) -> WaveformData {
        tracing::info!("Extraction cancelled {stage}");
        self.set_state(ExtractionState::Cancelled);
        self.progress.store(0.0);
        self.notify(0.0);
        WaveformData::empty()
    }
}
