//! Integration tests for sonido-cli.
//!
//! Drives the built `sonido` binary as a subprocess and checks its output,
//! the way `examples/ampactor-sonido/crates/sonido-cli/tests/integration.rs`
//! exercises its own subcommands.

use std::process::Command;

fn sonido_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sonido"))
}

#[test]
fn cli_help_works() {
    let output = sonido_bin().arg("--help").output().expect("failed to run sonido --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("devices"));
    assert!(stdout.contains("info"));
    assert!(stdout.contains("stream"));
}

#[test]
fn cli_version_works() {
    let output = sonido_bin().arg("--version").output().expect("failed to run sonido --version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sonido"));
}

#[test]
fn cli_devices_list_does_not_error() {
    // No real audio device is guaranteed in CI, but enumeration itself
    // should never fail -- it reports an empty list instead.
    let output = sonido_bin()
        .arg("devices")
        .output()
        .expect("failed to run sonido devices");
    assert!(output.status.success(), "sonido devices failed: {:?}", output);
}

#[test]
fn cli_devices_info_does_not_error() {
    let output = sonido_bin()
        .args(["devices", "info"])
        .output()
        .expect("failed to run sonido devices info");
    assert!(output.status.success());
}

#[test]
fn cli_info_shows_wav_metadata() {
    let file = tempfile::NamedTempFile::new().unwrap();
    sonido_io::write_wav(
        file.path(),
        &[0.0f32; 480],
        sonido_io::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
        },
    )
    .unwrap();

    let output = sonido_bin()
        .arg("info")
        .arg(file.path())
        .output()
        .expect("failed to run sonido info");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("48000 Hz"));
    assert!(stdout.contains("Channels:    1"));
}

#[test]
fn cli_info_nonexistent_file_fails() {
    let output = sonido_bin()
        .arg("info")
        .arg("/nonexistent/path/does-not-exist.wav")
        .output()
        .expect("failed to run sonido info");
    assert!(!output.status.success());
}

#[test]
fn cli_stream_requires_at_least_one_direction() {
    let output = sonido_bin()
        .arg("stream")
        .output()
        .expect("failed to run sonido stream");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("input") || stderr.contains("output"));
}
