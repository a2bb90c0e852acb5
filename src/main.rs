//! Command-line waveform extractor: prints per-channel peak envelopes as JSON.

mod cli;

fn main() {
    if let Err(err) = cli::run(std::env::args().skip(1).collect()) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
