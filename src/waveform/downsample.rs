use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::cancel::{self, CancellationFlag};
use super::peak;
use super::progress::ProgressSink;
use super::WaveformData;

/// Pixels processed between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: usize = 100;

/// Window size and channel layout for one downsampling pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractionParameters {
    /// Input samples reduced into each output pixel, per channel.
    pub samples_per_pixel: usize,
    /// Number of interleaved channels in the buffer.
    pub num_channels: usize,
}

impl ExtractionParameters {
    /// Build parameters for a window size and channel count.
    pub fn new(samples_per_pixel: usize, num_channels: usize) -> Self {
        Self {
            samples_per_pixel,
            num_channels,
        }
    }

    /// Number of complete pixels a buffer of `buffer_len` samples yields; zero when invalid.
    pub fn pixel_count(&self, buffer_len: usize) -> usize {
        if self.samples_per_pixel == 0 || self.num_channels == 0 {
            return 0;
        }
        buffer_len / self.samples_per_pixel.saturating_mul(self.num_channels)
    }
}

/// How the engine spreads pixels across threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Single-threaded when there are no more pixels than lanes, threaded otherwise.
    #[default]
    Auto,
    /// Always run on the calling thread.
    SingleThreaded,
    /// Always dispatch workers, even for tiny inputs.
    MultiThreaded,
}

/// Configured downsampling engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct Downsampler {
    mode: ExecutionMode,
    parallelism: Option<usize>,
}

impl Downsampler {
    /// Engine with automatic mode selection and hardware-sized parallelism.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the number of worker lanes; `None` or zero uses the hardware count.
    pub fn with_parallelism(mut self, parallelism: Option<usize>) -> Self {
        self.parallelism = parallelism.filter(|lanes| *lanes > 0);
        self
    }

    /// Configured mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Worker lanes used by the threaded path.
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(available_parallelism)
    }

    /// Reduce an interleaved buffer into per-channel peak pixels.
    ///
    /// Returns an empty result for invalid parameters, a buffer shorter than one pixel, or
    /// when `cancel` is observed. On success the sink receives a final 1.0.
    pub fn downsample(
        &self,
        samples: &[f32],
        params: ExtractionParameters,
        cancel: Option<&CancellationFlag>,
        progress: Option<ProgressSink<'_>>,
    ) -> WaveformData {
        let num_pixels = params.pixel_count(samples.len());
        if num_pixels == 0 {
            return WaveformData::empty();
        }
        let lanes = self.parallelism();
        let threaded = match self.mode {
            ExecutionMode::Auto => num_pixels > lanes,
            ExecutionMode::SingleThreaded => false,
            ExecutionMode::MultiThreaded => true,
        };
        tracing::debug!(
            "Downsampling {} samples into {num_pixels} pixels x {} channels ({})",
            samples.len(),
            params.num_channels,
            if threaded { "threaded" } else { "single-threaded" }
        );
        let started_at = Instant::now();
        let job = PixelJob {
            samples,
            params,
            num_pixels,
            cancel,
            progress,
        };
        let result = if threaded {
            job.run_threaded(lanes)
        } else {
            job.run_single()
        };
        match result {
            Some(channels) => {
                tracing::debug!(
                    "Downsampled {num_pixels} pixels in {} ms",
                    started_at.elapsed().as_millis()
                );
                WaveformData::from(channels)
            }
            None => {
                tracing::debug!("Downsampling cancelled");
                WaveformData::empty()
            }
        }
    }
}

/// Downsample with the default engine configuration.
pub fn downsample(
    samples: &[f32],
    params: ExtractionParameters,
    cancel: Option<&CancellationFlag>,
    progress: Option<ProgressSink<'_>>,
) -> WaveformData {
    Downsampler::default().downsample(samples, params, cancel, progress)
}

/// Usable hardware concurrency, at least 1.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

/// Contiguous pixel ranges of `ceil(num_pixels / lanes)` pixels each.
///
/// Earlier ranges absorb the remainder, so 101 pixels over 4 lanes gives 26, 26, 26, 23.
pub fn partition_pixels(num_pixels: usize, lanes: usize) -> Vec<Range<usize>> {
    if num_pixels == 0 {
        return Vec::new();
    }
    let per_lane = num_pixels.div_ceil(lanes.max(1));
    (0..num_pixels)
        .step_by(per_lane)
        .map(|start| start..(start + per_lane).min(num_pixels))
        .collect()
}

struct PixelJob<'a> {
    samples: &'a [f32],
    params: ExtractionParameters,
    num_pixels: usize,
    cancel: Option<&'a CancellationFlag>,
    progress: Option<ProgressSink<'a>>,
}

impl PixelJob<'_> {
    fn is_cancelled(&self) -> bool {
        cancel::is_cancelled(self.cancel)
    }

    fn report(&self, processed: usize) {
        if let Some(sink) = self.progress {
            sink(processed as f64 / self.num_pixels as f64);
        }
    }

    fn pixel_peak(&self, pixel: usize, channel: usize) -> f32 {
        let ExtractionParameters {
            samples_per_pixel,
            num_channels,
        } = self.params;
        let frame_start = pixel * samples_per_pixel * num_channels;
        if num_channels == 1 {
            let window = &self.samples[frame_start..frame_start + samples_per_pixel];
            return peak::max_abs(window);
        }
        let start = frame_start + channel;
        let end = frame_start + samples_per_pixel * num_channels;
        peak::max_abs_strided(&self.samples[start..end], num_channels)
    }

    fn run_single(&self) -> Option<Vec<Vec<f32>>> {
        let channels = self.params.num_channels;
        let mut output = vec![vec![0.0_f32; self.num_pixels]; channels];
        let report_every = (self.num_pixels / 10).max(1);
        for pixel in 0..self.num_pixels {
            if pixel % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
                return None;
            }
            for (channel, pixels) in output.iter_mut().enumerate() {
                pixels[pixel] = self.pixel_peak(pixel, channel);
            }
            if pixel % report_every == 0 || pixel % 1_000 == 0 {
                self.report(pixel + 1);
            }
        }
        self.report(self.num_pixels);
        Some(output)
    }

    fn run_threaded(&self, lanes: usize) -> Option<Vec<Vec<f32>>> {
        let channels = self.params.num_channels;
        let mut output = vec![vec![0.0_f32; self.num_pixels]; channels];
        let ranges = partition_pixels(self.num_pixels, lanes);
        let per_lane = ranges.first().map(|range| range.len()).unwrap_or(1);
        let processed = AtomicUsize::new(0);
        {
            let mut channel_chunks: Vec<_> = output
                .iter_mut()
                .map(|pixels| pixels.chunks_mut(per_lane))
                .collect();
            std::thread::scope(|scope| {
                for range in ranges {
                    let slices: Vec<&mut [f32]> = channel_chunks
                        .iter_mut()
                        .filter_map(|chunks| chunks.next())
                        .collect();
                    let processed = &processed;
                    scope.spawn(move || self.run_lane(range, slices, processed));
                }
            });
        }
        if self.is_cancelled() {
            return None;
        }
        self.report(self.num_pixels);
        Some(output)
    }

    fn run_lane(&self, range: Range<usize>, mut slices: Vec<&mut [f32]>, processed: &AtomicUsize) {
        let report_every = (self.num_pixels / 20).max(1);
        for (offset, pixel) in range.enumerate() {
            if offset % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
                return;
            }
            for (channel, pixels) in slices.iter_mut().enumerate() {
                pixels[offset] = self.pixel_peak(pixel, channel);
            }
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % report_every == 0 || done % 500 == 0 {
                self.report(done);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Mutex;

    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-1.0_f32..1.0)).collect()
    }

    fn assert_close(left: &WaveformData, right: &WaveformData) {
        assert_eq!(left.channel_count(), right.channel_count());
        for (a, b) in left.channels().iter().zip(right.channels()) {
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-5, "{x} != {y}");
            }
        }
    }

    #[test]
    fn mono_worked_example() {
        let samples = [0.1_f32, 0.5, 0.3, 0.2];
        let result = downsample(&samples, ExtractionParameters::new(2, 1), None, None);
        assert_eq!(result.channels(), &[vec![0.5, 0.3]]);
    }

    #[test]
    fn stereo_worked_example() {
        let samples = [0.1_f32, 0.2, 0.5, 0.6, 0.3, 0.4, 0.2, 0.1];
        let result = downsample(&samples, ExtractionParameters::new(2, 2), None, None);
        assert_eq!(result.channels(), &[vec![0.5, 0.3], vec![0.6, 0.4]]);
    }

    #[test]
    fn invalid_parameters_give_empty_results() {
        let samples = [0.5_f32; 8];
        for params in [
            ExtractionParameters::new(0, 1),
            ExtractionParameters::new(2, 0),
            ExtractionParameters::new(5, 2),
        ] {
            assert!(downsample(&samples, params, None, None).is_empty(), "{params:?}");
        }
        assert!(downsample(&[], ExtractionParameters::new(1, 1), None, None).is_empty());
    }

    #[test]
    fn partial_trailing_window_is_dropped() {
        let samples = [0.1_f32, 0.2, 0.3, 0.9, 0.95];
        let result = downsample(&samples, ExtractionParameters::new(2, 1), None, None);
        assert_eq!(result.channels(), &[vec![0.2, 0.9]]);
    }

    #[test]
    fn shape_matches_buffer_length() {
        let samples = noise(10_007, 3);
        let result = downsample(&samples, ExtractionParameters::new(16, 3), None, None);
        assert_eq!(result.channel_count(), 3);
        for channel in result.channels() {
            assert_eq!(channel.len(), 10_007 / 48);
        }
    }

    #[test]
    fn partition_absorbs_remainder_in_early_ranges() {
        let sizes: Vec<usize> = partition_pixels(101, 4).iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![26, 26, 26, 23]);
        let ranges = partition_pixels(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..9, 9..10]);
        assert!(partition_pixels(0, 4).is_empty());
        assert_eq!(partition_pixels(5, 0), vec![0..5]);
    }

    #[test]
    fn threading_modes_agree() {
        for channels in [1, 2, 5] {
            let samples = noise(64 * channels * 1_537, channels as u64);
            let params = ExtractionParameters::new(64, channels);
            let single = Downsampler::new()
                .with_mode(ExecutionMode::SingleThreaded)
                .downsample(&samples, params, None, None);
            for lanes in [2, 3, 8] {
                let threaded = Downsampler::new()
                    .with_mode(ExecutionMode::MultiThreaded)
                    .with_parallelism(Some(lanes))
                    .downsample(&samples, params, None, None);
                assert_close(&single, &threaded);
            }
        }
    }

    #[test]
    fn threaded_mode_handles_fewer_pixels_than_lanes() {
        let samples = [0.1_f32, 0.5, 0.3, 0.2];
        let result = Downsampler::new()
            .with_mode(ExecutionMode::MultiThreaded)
            .with_parallelism(Some(16))
            .downsample(&samples, ExtractionParameters::new(2, 1), None, None);
        assert_eq!(result.channels(), &[vec![0.5, 0.3]]);
    }

    #[test]
    fn mono_peaks_match_scalar_reference() {
        let samples = noise(33 * 211, 11);
        let result = downsample(&samples, ExtractionParameters::new(33, 1), None, None);
        for (pixel, value) in result.channels()[0].iter().enumerate() {
            let window = &samples[pixel * 33..(pixel + 1) * 33];
            let expected = peak::PeakKernel::Scalar.max_abs(window);
            assert_eq!(*value, expected);
        }
    }

    #[test]
    fn single_threaded_reports_checkpoints_and_final_value() {
        let samples = vec![0.5_f32; 20];
        let reports = Mutex::new(Vec::new());
        let sink = |value: f64| reports.lock().unwrap().push(value);
        let result = Downsampler::new()
            .with_mode(ExecutionMode::SingleThreaded)
            .downsample(&samples, ExtractionParameters::new(1, 1), None, Some(&sink));
        assert_eq!(result.pixels_per_channel(), 20);
        let reports = reports.into_inner().unwrap();
        // Every 2 pixels (20 / 10) plus the final report.
        assert_eq!(reports.len(), 11);
        assert_eq!(reports[0], 1.0 / 20.0);
        assert_eq!(*reports.last().unwrap(), 1.0);
    }

    #[test]
    fn threaded_run_always_ends_with_full_progress() {
        let samples = noise(4 * 5_000, 5);
        let reports = Mutex::new(Vec::new());
        let sink = |value: f64| reports.lock().unwrap().push(value);
        Downsampler::new()
            .with_mode(ExecutionMode::MultiThreaded)
            .with_parallelism(Some(4))
            .downsample(&samples, ExtractionParameters::new(4, 1), None, Some(&sink));
        let reports = reports.into_inner().unwrap();
        assert!(reports.len() >= 20);
        assert!(reports.iter().all(|value| (0.0..=1.0).contains(value)));
        assert_eq!(*reports.last().unwrap(), 1.0);
    }

    #[test]
    fn pre_set_flag_cancels_both_modes() {
        let samples = noise(8_000, 9);
        let flag = CancellationFlag::new();
        flag.cancel();
        for mode in [ExecutionMode::SingleThreaded, ExecutionMode::MultiThreaded] {
            let result = Downsampler::new().with_mode(mode).downsample(
                &samples,
                ExtractionParameters::new(2, 2),
                Some(&flag),
                None,
            );
            assert!(result.is_empty(), "{mode:?}");
        }
    }

    #[test]
    fn cancellation_is_observed_within_one_check_interval() {
        let samples = vec![0.25_f32; 100_000];
        let flag = CancellationFlag::new();
        let calls = AtomicUsize::new(0);
        let sink = |_: f64| {
            calls.fetch_add(1, Ordering::Relaxed);
            flag.cancel();
        };
        let result = Downsampler::new()
            .with_mode(ExecutionMode::SingleThreaded)
            .downsample(&samples, ExtractionParameters::new(1, 1), Some(&flag), Some(&sink));
        assert!(result.is_empty());
        // First report lands at pixel 0, the next check at pixel 100 stops before pixel 1000.
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cancelled_threaded_run_skips_final_report() {
        let samples = vec![0.25_f32; 200_000];
        let flag = CancellationFlag::new();
        let saw_full = std::sync::atomic::AtomicBool::new(false);
        let sink = |value: f64| {
            if value >= 1.0 {
                saw_full.store(true, Ordering::Relaxed);
            }
            flag.cancel();
        };
        let result = Downsampler::new()
            .with_mode(ExecutionMode::MultiThreaded)
            .with_parallelism(Some(4))
            .downsample(&samples, ExtractionParameters::new(1, 1), Some(&flag), Some(&sink));
        assert!(result.is_empty());
        assert!(!saw_full.load(Ordering::Relaxed));
    }
}
