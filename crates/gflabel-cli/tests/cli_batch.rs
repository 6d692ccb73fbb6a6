use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn gflabel_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gflabel"))
}

fn run_gflabel(dir: &Path, args: &[&str]) -> Output {
    Command::new(gflabel_bin())
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("GFLABEL_FONT")
        .output()
        .expect("run gflabel binary")
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("read output");
    serde_json::from_str(&text).expect("parse output")
}

#[test]
fn writes_placements_for_every_label() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["--divisions", "2", "{nut} M3", "{washer}M4", "M5"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let document = read_json(&dir.path().join("label.json"));
    let labels = document["labels"].as_array().expect("labels");
    assert_eq!(labels.len(), 3);
    assert!(labels.iter().all(|label| label["status"] == "ok"));
    assert_eq!(document["sheet"]["divisions"], 2);
    assert_eq!(document["base"]["kind"], "pred");

    let first = labels[0]["placements"].as_array().expect("placements");
    assert!(first.iter().any(|p| p["content"]["kind"] == "hexnut"));
    assert!(first.iter().all(|p| p["visible"] == true));

    // Third label starts a second physical label below the first.
    let first_area = labels[0]["area"]["y"].as_f64().expect("y");
    let third_area = labels[2]["area"]["y"].as_f64().expect("y");
    assert!(third_area < first_area);
}

#[test]
fn failing_label_does_not_stop_the_batch() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["-d", "0", "-o", "out.json", "M3", "{nosuchfragment}", "M4"],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 3 labels failed"), "stderr: {stderr}");

    let document = read_json(&dir.path().join("out.json"));
    let labels = document["labels"].as_array().expect("labels");
    assert_eq!(labels[0]["status"], "ok");
    assert_eq!(labels[1]["status"], "error");
    assert_eq!(labels[1]["error"]["kind"], "unknown-fragment");
    assert_eq!(labels[2]["status"], "ok");
}

#[test]
fn geometry_outputs_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(dir.path(), &["-o", "label.step", "M3"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("label.step"));
    assert!(!dir.path().join("label.step").exists());
}

#[test]
fn conflicting_font_sizes_exit_two() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["--font-size", "4", "--font-size-maximum", "5", "M3"],
    );
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_base_size_exits_two() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(dir.path(), &["--base", "predbox", "--width", "3", "M3"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("label.json").exists());
}

#[test]
fn overflow_is_reported_but_succeeds() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["--font-size", "9", "A very long label that cannot fit"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let document = read_json(&dir.path().join("label.json"));
    let warnings = document["labels"][0]["warnings"].as_array().expect("warnings");
    assert!(!warnings.is_empty());
}

#[test]
fn colors_pass_through() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["--base-color", "black", "--label-color", "white", "M3"],
    );
    assert!(output.status.success());
    let document = read_json(&dir.path().join("label.json"));
    assert_eq!(document["attributes"]["base_color"], "black");
    let placements = document["labels"][0]["placements"].as_array().expect("placements");
    assert!(placements.iter().all(|p| p["attributes"]["color"] == "white"));
}

#[test]
fn stdout_output_and_options_echo() {
    let dir = tempdir().expect("tempdir");
    let output = run_gflabel(
        dir.path(),
        &["-o", "-", "--style", "debossed", "--base", "none", "-w", "40", "M3"],
    );
    assert!(output.status.success());
    let document: Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(document["options"]["style"], "debossed");
    assert_eq!(document["base"]["area"]["width"], 40.0);
    let z = document["labels"][0]["placements"][0]["z"].as_f64().expect("z");
    assert_eq!(z, -0.4);
}

#[test]
fn listing_modes_print_without_layout() {
    let dir = tempdir().expect("tempdir");
    let fragments = run_gflabel(dir.path(), &["--list-fragments"]);
    assert!(fragments.status.success());
    let text = String::from_utf8_lossy(&fragments.stdout);
    assert!(text.contains("{bolt}"));
    assert!(text.contains("{webbolt}"));

    let symbols = run_gflabel(dir.path(), &["--list-symbols"]);
    assert!(symbols.status.success());
    assert!(String::from_utf8_lossy(&symbols.stdout).starts_with("ID"));
    assert!(!dir.path().join("label.json").exists());
}
