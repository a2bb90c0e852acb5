mod options;
mod report;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use waveform_extract::config::{self, ExtractorSettings};
use waveform_extract::logging::{self, Verbosity};
use waveform_extract::waveform::{
    CancellationFlag, Downsampler, ExtractionSession, ExtractionState, FileDecoder,
};

use options::CliOptions;
use report::ExtractionReport;

pub(crate) fn run(args: Vec<String>) -> Result<(), String> {
    let Some(options) = options::parse_args(args)? else {
        return Ok(());
    };
    if let Err(err) = logging::init(Verbosity::from_flags(options.quiet, options.verbose)) {
        eprintln!("Logging disabled: {err}");
    }

    let settings = load_settings(&options)?;
    let request = options.request(&settings)?;
    let session = build_session(&options, &settings);
    if !options.quiet {
        session.on_progress(progress_printer());
    }

    let started_at = Instant::now();
    let deadline = options
        .timeout_ms
        .map(|ms| Deadline::start(session.cancellation_flag(), Duration::from_millis(ms)));
    let result = session.extract(&request);
    if let Some(deadline) = deadline {
        deadline.finish();
    }
    let waveform = result.map_err(|err| format!("Extraction failed: {err}"))?;
    let cancelled = session.state() == ExtractionState::Cancelled;

    let report = ExtractionReport::new(
        request.path.clone(),
        request.samples_per_pixel,
        cancelled,
        started_at.elapsed().as_millis() as u64,
        waveform,
    );
    let payload = serde_json::to_vec_pretty(&report)
        .map_err(|err| format!("Serialize report failed: {err}"))?;
    match &options.out {
        Some(path) => {
            options::write_output(path, &payload)?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&payload)),
    }
    if cancelled {
        return Err("Extraction cancelled".to_string());
    }
    Ok(())
}

fn load_settings(options: &CliOptions) -> Result<ExtractorSettings, String> {
    match &options.config {
        Some(path) => config::load_from(path).map_err(|err| err.to_string()),
        None => Ok(config::load_or_default().unwrap_or_else(|err| {
            tracing::warn!("Using default settings: {err}");
            ExtractorSettings::default()
        })),
    }
}

fn build_session(options: &CliOptions, settings: &ExtractorSettings) -> ExtractionSession {
    let downsampler = Downsampler::new()
        .with_mode(options.mode)
        .with_parallelism(options.threads.or(settings.worker_threads));
    let decoder = FileDecoder::new().with_max_file_bytes(settings.max_file_bytes);
    ExtractionSession::new(decoder).with_downsampler(downsampler)
}

/// Prints whole-ten-percent steps to stderr.
fn progress_printer() -> impl Fn(f64) + Send + Sync + 'static {
    let last_step = AtomicUsize::new(usize::MAX);
    move |value| {
        let step = (value * 10.0).floor() as usize;
        if last_step.swap(step, Ordering::Relaxed) != step {
            eprintln!("{:>3}%", step * 10);
        }
    }
}

/// Timer thread that cancels an extraction unless it is finished first.
struct Deadline {
    done: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Deadline {
    fn start(flag: CancellationFlag, timeout: Duration) -> Self {
        let (done, finished) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = finished.recv_timeout(timeout) {
                tracing::warn!("Timed out after {} ms; cancelling", timeout.as_millis());
                flag.cancel();
            }
        });
        Self { done, handle }
    }

    fn finish(self) {
        drop(self.done);
        if self.handle.join().is_err() {
            tracing::warn!("Deadline thread panicked");
        }
    }
}
