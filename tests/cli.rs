use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

fn bundled_assets() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets")
}

fn demo() -> Command {
    Command::cargo_bin("shadow-demo").expect("binary exists")
}

#[test]
fn headless_run_reports_scene_and_shadow() {
    let mut cmd = demo();
    cmd.args(["--headless", "--assets", bundled_assets()])
        .args(["--shadow-resolution", "800x600"]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 4 objects"))
        .stdout(contains(" - center cube (cube)"))
        .stdout(contains(" - floating cube (cube)"))
        .stdout(contains(" - ground (plane)"))
        .stdout(contains("Light view:"))
        .stdout(contains("Shadow map 800x600"))
        .stdout(contains("Ground plane: shadowed"))
        .stdout(contains("of 10201 samples"));
}

#[test]
fn config_file_sets_shadow_resolution() {
    let mut config = NamedTempFile::new().expect("temp config");
    write!(config, "(shadow: (resolution: (320, 240), depth_bias: 0.001))").expect("write config");

    let mut cmd = demo();
    cmd.args(["--headless", "--assets", bundled_assets(), "--config"])
        .arg(config.path());
    cmd.assert()
        .success()
        .stdout(contains("Shadow map 320x240"));
}

#[test]
fn missing_assets_are_fatal() {
    let dir = tempdir().expect("temp dir");
    let mut cmd = demo();
    cmd.args(["--headless", "--assets"]).arg(dir.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("Error:"))
        .stderr(contains("cube"));
}

#[test]
fn broken_shader_directory_is_fatal() {
    let dir = tempdir().expect("temp dir");
    let meshes = dir.path().join("meshes");
    fs::create_dir(&meshes).expect("meshes dir");
    for name in ["cube.xml", "plane.xml"] {
        fs::copy(Path::new(bundled_assets()).join("meshes").join(name), meshes.join(name))
            .expect("copy mesh");
    }

    let mut cmd = demo();
    cmd.args(["--headless", "--assets"]).arg(dir.path());
    cmd.assert()
        .failure()
        .stderr(contains("shaded.vert.wgsl"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = demo();
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}

#[test]
fn help_prints_usage_and_succeeds() {
    let mut cmd = demo();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("Usage: shadow-demo"));
}

#[test]
fn oversized_shadow_map_is_rejected() {
    let mut cmd = demo();
    cmd.args(["--headless", "--assets", bundled_assets()])
        .args(["--shadow-resolution", "70000x70000"]);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("exceeds the 16384 texel limit"));
}
