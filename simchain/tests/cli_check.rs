//! CLI tests: spawn the simchain binary and verify exit codes.

use std::process::{Command, Output};

use simchain::exit_codes;
use simchain::io::config::{load_config, write_config};
use simchain::io::init::{InitOptions, init_project};
use simchain::test_support::TestWorkspace;

fn simchain(ws: &TestWorkspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_simchain"))
        .current_dir(ws.path())
        .args(args)
        .output()
        .expect("spawn simchain")
}

fn touch_models(ws: &TestWorkspace) {
    ws.write("models/power/power.apw", "").expect("power model");
    ws.write("models/ORC/ORC.apw", "").expect("orc model");
}

#[test]
fn init_then_check_reports_missing_models() {
    let ws = TestWorkspace::new().expect("workspace");

    let init = simchain(&ws, &["init"]);
    assert_eq!(init.status.code(), Some(exit_codes::OK));
    assert!(ws.path().join("simchain.toml").is_file());
    assert!(ws.path().join("models/ORC/ORC_paths.yaml").is_file());

    let check = simchain(&ws, &["check"]);
    assert_eq!(check.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&check.stderr);
    assert!(stderr.contains("model file missing"), "{stderr}");

    touch_models(&ws);
    let check = simchain(&ws, &["check"]);
    assert_eq!(check.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&check.stdout);
    assert!(stdout.contains("--- input_paths ---"), "{stdout}");
    assert!(stdout.contains("fuelfeed"), "{stdout}");
}

#[test]
fn check_resolves_paths_against_config_directory() {
    let ws = TestWorkspace::new().expect("workspace");
    let project = ws.path().join("plant");
    init_project(&project, &InitOptions::default()).expect("init");
    ws.write("plant/models/power/power.apw", "").expect("power model");
    ws.write("plant/models/ORC/ORC.apw", "").expect("orc model");

    let check = simchain(&ws, &["check", "--config", "plant/simchain.toml"]);
    assert_eq!(check.status.code(), Some(exit_codes::OK));
}

#[test]
fn missing_config_is_invalid() {
    let ws = TestWorkspace::new().expect("workspace");
    let check = simchain(&ws, &["check"]);
    assert_eq!(check.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unknown_only_stage_is_invalid() {
    let ws = TestWorkspace::new().expect("workspace");
    init_project(ws.path(), &InitOptions::default()).expect("init");
    touch_models(&ws);

    let run = simchain(&ws, &["run", "--only", "boiler"]);
    assert_eq!(run.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unavailable_bridge_fails_to_open() {
    let ws = TestWorkspace::new().expect("workspace");
    let paths = init_project(ws.path(), &InitOptions::default()).expect("init");
    touch_models(&ws);
    let mut cfg = load_config(&paths.config_path).expect("config");
    cfg.engine.command = vec!["simchain-test-no-such-bridge".to_string()];
    write_config(&paths.config_path, &cfg).expect("write config");

    let run = simchain(&ws, &["run", "--chain"]);
    assert_eq!(run.status.code(), Some(exit_codes::OPEN_FAILED));
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("stage `power` failed"), "{stderr}");
}
