//! End-to-end tests that shell out to the built `fskmodem` binary,
//! round-tripping data through WAV files the way a real tx/rx pair
//! would over an audio cable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn binary_path() -> PathBuf {
    // `cargo test` places the binary for the current profile two levels
    // up from the test's manifest dir.
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("target")
        .join(profile)
        .join("fskmodem")
}

fn tmp_dir() -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp");
    fs::create_dir_all(&dir).ok();
    dir
}

fn run_fskmodem(args: &[&str], stdin_data: &[u8]) -> (Vec<u8>, String, i32) {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new(binary_path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn fskmodem");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin_data)
        .expect("failed to write stdin");

    let output = child.wait_with_output().expect("failed to wait on fskmodem");
    (
        output.stdout,
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn tx_to_file(text: &str, path: &Path, extra_args: &[&str]) {
    let mut args = vec!["-t", "-f", path.to_str().unwrap()];
    args.extend_from_slice(extra_args);
    args.push("300");
    let (_out, stderr, code) = run_fskmodem(&args, text.as_bytes());
    assert_eq!(code, 0, "tx failed: {stderr}");
}

fn rx_from_file(path: &Path, extra_args: &[&str]) -> (String, String) {
    let mut args = vec!["-r", "-f", path.to_str().unwrap()];
    args.extend_from_slice(extra_args);
    args.push("300");
    let (stdout, stderr, code) = run_fskmodem(&args, &[]);
    assert_eq!(code, 0, "rx failed: {stderr}");
    (String::from_utf8_lossy(&stdout).to_string(), stderr)
}

#[test]
fn ascii_loopback_round_trips_through_wav_file() {
    let wav = tmp_dir().join("ascii_loopback.wav");
    tx_to_file("Hello\n", &wav, &["-8", "--float-samples"]);

    let (stdout, stderr) = rx_from_file(&wav, &["-8"]);
    assert_eq!(stdout, "Hello\n");
    assert!(stderr.contains("### CARRIER"), "stderr: {stderr}");
    assert!(stderr.contains("### NOCARRIER"), "stderr: {stderr}");
    assert!(stderr.contains("ndata=6"), "stderr: {stderr}");
}

#[test]
fn rtty_loopback_round_trips_baudot_text() {
    let wav = tmp_dir().join("rtty_loopback.wav");

    let tx_args = ["-t", "-f", wav.to_str().unwrap(), "--float-samples", "rtty"];
    let (_out, stderr, code) = run_fskmodem(&tx_args, b"RYRY\r\n");
    assert_eq!(code, 0, "tx failed: {stderr}");

    let rx_args = ["-r", "-f", wav.to_str().unwrap(), "rtty"];
    let (stdout, stderr, code) = run_fskmodem(&rx_args, &[]);
    assert_eq!(code, 0, "rx failed: {stderr}");
    assert_eq!(stdout, "RYRY\r\n");
    assert!(stderr.contains("ndata=6"), "stderr: {stderr}");
}

#[test]
fn quiet_suppresses_carrier_lines() {
    let wav = tmp_dir().join("quiet.wav");
    tx_to_file("Q", &wav, &["-8", "--float-samples"]);

    let args = vec!["-r", "-f", wav.to_str().unwrap(), "-q", "-8", "300"];
    let (stdout, stderr, code) = run_fskmodem(&args, &[]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "Q");
    assert!(stderr.is_empty(), "expected no report lines, got: {stderr}");
}

#[test]
fn mutually_exclusive_tx_rx_flags_exit_nonzero() {
    let (_out, stderr, code) = run_fskmodem(&["-t", "-r", "300"], &[]);
    assert_ne!(code, 0);
    assert!(stderr.contains("mutually exclusive"), "stderr: {stderr}");
}

#[test]
fn mutually_exclusive_ascii_baudot_flags_exit_nonzero() {
    let (_out, stderr, code) = run_fskmodem(&["-r", "-8", "-5", "300"], &[]);
    assert_ne!(code, 0);
    assert!(stderr.contains("mutually exclusive"), "stderr: {stderr}");
}

#[test]
fn invalid_baudmode_exits_nonzero() {
    let (_out, stderr, code) = run_fskmodem(&["-r", "not-a-rate"], &[]);
    assert_ne!(code, 0);
    assert!(!stderr.is_empty());
}

#[test]
fn missing_baudmode_argument_exits_nonzero() {
    let (_out, _stderr, code) = run_fskmodem(&["-r"], &[]);
    assert_ne!(code, 0);
}
