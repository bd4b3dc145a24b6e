use std::{fs, path::PathBuf, process::Command};

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ooze-defence"))
}

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ooze-defence-{}-{name}", std::process::id()));
    fs::write(&path, contents).expect("scratch scenario written");
    path
}

#[test]
fn built_in_scenario_prints_summary() {
    let output = binary()
        .args(["--ticks", "200", "--seed", "11"])
        .output()
        .expect("binary runs");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ticks simulated:      200"), "{stdout}");
    assert!(stdout.contains("packets delivered:"), "{stdout}");
    assert!(stdout.contains("pool high-water mark:"), "{stdout}");
}

#[test]
fn scenario_file_is_loaded() {
    let path = scratch_file(
        "pair.toml",
        r#"
        [[buildings]]
        kind = "command_center"
        x = 0.0
        y = 0.0

        [[buildings]]
        kind = "relay"
        x = 100.0
        y = 0.0
        "#,
    );

    let output = binary()
        .arg("--scenario")
        .arg(&path)
        .args(["--ticks", "100"])
        .output()
        .expect("binary runs");
    let _ = fs::remove_file(&path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("buildings built:      2/2"), "{stdout}");
}

#[test]
fn invalid_scenario_exits_with_context() {
    let path = scratch_file("broken.toml", "[[buildings]]\nkind = \"relay\"\nx = 0.0\ny = 0.0\n");

    let output = binary()
        .arg("--scenario")
        .arg(&path)
        .output()
        .expect("binary runs");
    let _ = fs::remove_file(&path);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid scenario"), "{stderr}");
    assert!(stderr.contains("command_center"), "{stderr}");
}

#[test]
fn missing_scenario_file_is_reported() {
    let output = binary()
        .args(["--scenario", "/nonexistent/ooze-defence.toml"])
        .output()
        .expect("binary runs");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read scenario"), "{stderr}");
}

#[test]
fn chaos_probability_is_validated() {
    let output = binary()
        .args(["--chaos", "1.5"])
        .output()
        .expect("binary runs");

    assert!(!output.status.success());
}
