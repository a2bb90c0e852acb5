//! Runs the built binary and checks what lands on stdout and stderr.

mod support;

use std::path::Path;
use std::process::{Command, Output};

use support::wav::write_test_wav_i16;
use tempfile::tempdir;
use waveform_extract::app_dirs::CONFIG_HOME_ENV;

fn run_extractor(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_waveform-extract"))
        .args(args)
        .env(CONFIG_HOME_ENV, config_home)
        .env_remove("RUST_LOG")
        .output()
        .expect("run waveform-extract")
}

fn tone(len: usize) -> Vec<i16> {
    (0..len).map(|idx| ((idx % 50) as i16 - 25) * 1_000).collect()
}

#[test]
fn default_run_prints_only_json_on_stdout() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("tone.wav");
    write_test_wav_i16(&audio, 1, &tone(400));

    let output = run_extractor(dir.path(), &[audio.to_str().unwrap(), "-n", "4"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
    assert_eq!(report["channels"], 1);
    assert_eq!(report["pixels_per_channel"], 100);
    assert_eq!(report["cancelled"], false);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("100%"), "{stderr}");
}

#[test]
fn verbose_run_keeps_stdout_clean() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("tone.wav");
    write_test_wav_i16(&audio, 1, &tone(64));

    let output = run_extractor(dir.path(), &[audio.to_str().unwrap(), "-n", "8", "--verbose"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["pixels_per_channel"], 8);
}

#[test]
fn out_flag_writes_report_file() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("tone.wav");
    let out = dir.path().join("reports").join("peaks.json");
    write_test_wav_i16(&audio, 1, &tone(64));

    let output = run_extractor(
        dir.path(),
        &[audio.to_str().unwrap(), "-n", "8", "--out", out.to_str().unwrap()],
    );

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
    assert_eq!(report["channels"], 1);
}

#[test]
fn missing_input_fails_without_stdout() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.wav");

    let output = run_extractor(dir.path(), &[missing.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Extraction failed"));
}
