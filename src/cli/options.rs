use std::path::{Path, PathBuf};

use waveform_extract::config::{ExtractorSettings, MAX_WORKER_THREADS};
use waveform_extract::waveform::{ExecutionMode, ExtractionRequest};

#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct CliOptions {
    pub(super) input: Option<PathBuf>,
    pub(super) samples_per_pixel: Option<i64>,
    pub(super) normalize: Option<bool>,
    pub(super) scale: Option<f32>,
    pub(super) threshold: Option<f32>,
    pub(super) threads: Option<usize>,
    pub(super) mode: ExecutionMode,
    pub(super) timeout_ms: Option<u64>,
    pub(super) config: Option<PathBuf>,
    pub(super) out: Option<PathBuf>,
    pub(super) quiet: bool,
    pub(super) verbose: bool,
}

impl CliOptions {
    /// Build the request, letting flags override the loaded settings.
    pub(super) fn request(&self, settings: &ExtractorSettings) -> Result<ExtractionRequest, String> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| format!("Missing input file\n\n{}", help_text()))?;
        let mut request = ExtractionRequest::from_settings(input, settings);
        if let Some(samples_per_pixel) = self.samples_per_pixel {
            request.samples_per_pixel = samples_per_pixel;
        }
        if let Some(normalize) = self.normalize {
            request.normalize = normalize;
        }
        if let Some(scale) = self.scale {
            request.scale = scale;
        }
        if let Some(threshold) = self.threshold {
            request.threshold = threshold;
        }
        Ok(request)
    }
}

/// Parse arguments; `Ok(None)` when help was printed.
pub(super) fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    if apply_args(&mut options, &args)? {
        return Ok(None);
    }
    if options.input.is_none() {
        return Err(format!("Missing input file\n\n{}", help_text()));
    }
    Ok(Some(options))
}

pub(super) fn write_output(path: &Path, payload: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Create output dir {} failed: {err}", parent.display()))?;
    }
    std::fs::write(path, payload)
        .map_err(|err| format!("Write output {} failed: {err}", path.display()))?;
    Ok(())
}

fn apply_args(options: &mut CliOptions, args: &[String]) -> Result<bool, String> {
    let mut idx = 0usize;
    while idx < args.len() {
        if apply_arg(options, args, &mut idx)? {
            return Ok(true);
        }
        idx += 1;
    }
    Ok(false)
}

fn apply_arg(options: &mut CliOptions, args: &[String], idx: &mut usize) -> Result<bool, String> {
    let flag = args.get(*idx).map(String::as_str).unwrap_or_default();
    if flag == "-h" || flag == "--help" {
        println!("{}", help_text());
        return Ok(true);
    }
    if apply_toggle(options, flag) {
        return Ok(false);
    }
    if apply_value(options, args, idx, flag)? {
        return Ok(false);
    }
    if !flag.starts_with('-') || flag == "-" {
        if options.input.is_some() {
            return Err(format!("Unexpected extra input: {flag}"));
        }
        options.input = Some(PathBuf::from(flag));
        return Ok(false);
    }
    Err(format!("Unknown argument: {flag}\n\n{}", help_text()))
}

fn apply_toggle(options: &mut CliOptions, flag: &str) -> bool {
    match flag {
        "--normalize" => options.normalize = Some(true),
        "--no-normalize" => options.normalize = Some(false),
        "--single-threaded" => options.mode = ExecutionMode::SingleThreaded,
        "--multi-threaded" => options.mode = ExecutionMode::MultiThreaded,
        "-q" | "--quiet" => options.quiet = true,
        "-v" | "--verbose" => options.verbose = true,
        _ => return false,
    }
    true
}

fn apply_value(
    options: &mut CliOptions,
    args: &[String],
    idx: &mut usize,
    flag: &str,
) -> Result<bool, String> {
    match flag {
        "-n" | "--samples-per-pixel" => {
            options.samples_per_pixel = Some(parse_value(args, idx, flag)?);
        }
        "--scale" => options.scale = Some(parse_value(args, idx, flag)?),
        "--threshold" => options.threshold = Some(parse_value(args, idx, flag)?),
        "--threads" => {
            let threads: usize = parse_value(args, idx, flag)?;
            if threads == 0 {
                return Err("--threads must be at least 1".to_string());
            }
            options.threads = Some(threads.min(MAX_WORKER_THREADS));
        }
        "--timeout-ms" => options.timeout_ms = Some(parse_value(args, idx, flag)?),
        "--config" => options.config = Some(PathBuf::from(value_after(args, idx, flag)?)),
        "-o" | "--out" => options.out = Some(PathBuf::from(value_after(args, idx, flag)?)),
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_value<T: std::str::FromStr>(
    args: &[String],
    idx: &mut usize,
    flag: &str,
) -> Result<T, String> {
    let value = value_after(args, idx, flag)?;
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn value_after<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    let value = args.get(*idx).ok_or_else(|| format!("{flag} requires a value"))?;
    Ok(value)
}

fn help_text() -> &'static str {
    "waveform-extract <path> [options]\n\n\
Options:\n\
  -n, --samples-per-pixel N  Samples per channel reduced into one pixel\n\
  --normalize / --no-normalize  Rescale pixels to the loudest value (default: on)\n\
  --scale F                  Target peak after normalization (default: 1.0)\n\
  --threshold F              Drop magnitudes below F during normalization (default: 0.0)\n\
  --threads N                Downsampling worker threads, at most 256 (default: all cores)\n\
  --single-threaded          Downsample on the calling thread\n\
  --multi-threaded           Always split downsampling across workers\n\
  --timeout-ms MS            Cancel the extraction after MS milliseconds\n\
  --config PATH              Settings file (default: waveform-extract.toml in the app dir)\n\
  -o, --out PATH             Write JSON to PATH instead of stdout\n\
  -q, --quiet                Only log warnings and hide progress\n\
  -v, --verbose              Log engine details to stderr\n\
  -h, --help                 Show this help\n"
}
