use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

const STRIP: &str = "[[310, 72.5], [330, 72.5], [330, 127.5], [310, 127.5]]";

fn frames_json(target_frames: usize, empty_frames: usize) -> String {
    let mut frames: Vec<String> = (0..target_frames).map(|_| format!("[{STRIP}]")).collect();
    frames.extend((0..empty_frames).map(|_| "[]".to_string()));
    format!("[{}]", frames.join(","))
}

fn cli() -> Command {
    Command::cargo_bin("hub-targets").unwrap()
}

#[test]
fn replay_writes_reports_and_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames.json");
    let out = dir.path().join("out.json");
    fs::write(&frames, frames_json(3, 1)).unwrap();

    cli()
        .args(["--log-level", "warn", "replay", "--frames"])
        .arg(&frames)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let outcome: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let reports = outcome["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[2]["state"], "LOCKED");
    assert_eq!(reports[3]["state"], "SEARCHING");
    assert!(reports[3]["bounds"].is_null());

    let telemetry = &outcome["telemetry"];
    assert_eq!(telemetry["Hub/hasTarget"], false);
    assert_eq!(telemetry["Hub/currentCamera"], "Shooter");
    assert_eq!(telemetry["Hub/shapesAreas"], serde_json::json!([]));
}

#[test]
fn replay_honours_config_and_overlay_dir() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames.json");
    let config = dir.path().join("config.json");
    let overlays = dir.path().join("overlays");
    fs::write(&frames, frames_json(2, 0)).unwrap();
    fs::write(&config, r#"{ "camera": { "name": "Intake" }, "lock": { "frames_to_lock": 2 } }"#)
        .unwrap();

    cli()
        .args(["replay", "--config"])
        .arg(&config)
        .arg("--frames")
        .arg(&frames)
        .arg("--overlay-dir")
        .arg(&overlays)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Hub/currentCamera\": \"Intake\""))
        .stdout(predicate::str::contains("\"LOCKED\""));

    assert!(overlays.join("frame_00000.png").exists());
    assert!(overlays.join("frame_00001.png").exists());
}

#[test]
fn invalid_lock_policy_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames.json");
    let config = dir.path().join("config.json");
    fs::write(&frames, frames_json(1, 0)).unwrap();
    fs::write(&config, r#"{ "lock": { "frames_to_lock": 1 } }"#).unwrap();

    cli()
        .args(["replay", "--config"])
        .arg(&config)
        .arg("--frames")
        .arg(&frames)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 consecutive frames"));
}

#[test]
fn missing_frames_file_fails() {
    cli()
        .args(["replay", "--frames", "/no/such/frames.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn default_config_prints_calibrated_values() {
    cli()
        .arg("default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"slope\": -1.2033"))
        .stdout(predicate::str::contains("\"name\": \"Shooter\""));
}
