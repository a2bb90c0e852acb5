//! Library exports for the extractor binary, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
/// Persisted extractor defaults.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Peak envelope extraction engine.
pub mod waveform;
