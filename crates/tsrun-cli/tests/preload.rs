//! Integration tests for the loader preloaded into the runtime.

#![cfg(unix)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tsrun"));
    cmd.env_remove("TSRUN_LOADER")
        .env_remove("TSRUN_EXECUTABLE")
        .env_remove("TSRUN_TSCONFIG_PATH")
        .env_remove("TSRUN_TRANSFORM_CMD")
        .env_remove("TSRUN_RUNTIME")
        .env_remove("NODE_CHANNEL_FD")
        .env_remove("RUST_LOG");
    cmd
}

/// An executable standing in for the runtime: records its arguments and the
/// executable the loader would call.
fn recording_runtime(dir: &Path) -> PathBuf {
    let path = dir.join("fake-node");
    fs::write(
        &path,
        "#!/bin/sh\nprintf '%s\\n' \"$@\" > args.txt\nprintf '%s' \"$TSRUN_EXECUTABLE\" > exe.txt\n",
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_default_preload_is_the_embedded_loader() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = recording_runtime(dir.path());

    let status = cargo_bin()
        .arg("--runtime")
        .arg(&runtime)
        .arg("--cwd")
        .arg(dir.path())
        .arg("app.ts")
        .status()
        .unwrap();
    assert!(status.success());

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args.len(), 3, "{args:?}");
    assert_eq!(args[0], "--import");
    assert_eq!(args[2], "app.ts");

    let encoded = args[1]
        .strip_prefix("data:text/javascript;base64,")
        .unwrap_or_else(|| panic!("not a data URL: {}", args[1]));
    let loader = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert!(loader.contains("export async function resolve("));
    assert!(loader.contains("export async function load("));

    let exe = fs::read_to_string(dir.path().join("exe.txt")).unwrap();
    assert!(Path::new(&exe).is_file(), "loader callback target missing: {exe}");
    assert_eq!(
        fs::canonicalize(&exe).unwrap(),
        fs::canonicalize(env!("CARGO_BIN_EXE_tsrun")).unwrap()
    );
}

#[test]
fn test_loader_flag_overrides_the_embedded_loader() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = recording_runtime(dir.path());

    let status = cargo_bin()
        .arg("--runtime")
        .arg(&runtime)
        .args(["--loader", "./custom.mjs", "--cwd"])
        .arg(dir.path())
        .arg("app.ts")
        .status()
        .unwrap();
    assert!(status.success());

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert_eq!(args, "--import\n./custom.mjs\napp.ts\n");
    assert_eq!(fs::read_to_string(dir.path().join("exe.txt")).unwrap(), "");
}

/// `node` with `module.register` (20.6 or later), if installed.
fn node_with_hooks() -> Option<()> {
    let output = Command::new("node")
        .args(["-p", "process.versions.node"])
        .output()
        .ok()?;
    let version = String::from_utf8(output.stdout).ok()?;
    let mut parts = version.trim().split('.').map(|p| p.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next()??;
    (major > 20 || (major == 20 && minor >= 6)).then_some(())
}

#[test]
fn test_node_loads_typescript_through_the_transform_command() {
    if node_with_hooks().is_none() {
        eprintln!("skipping: node 20.6+ not found");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"type":"module"}"#).unwrap();
    fs::write(dir.path().join("app.ts"), "console.log('untransformed');\n").unwrap();
    fs::write(
        dir.path().join("transform.sh"),
        "cat >/dev/null\nprintf '{\"code\":\"console.log(41 + 1)\"}'\n",
    )
    .unwrap();

    let output = cargo_bin()
        .args(["--cwd"])
        .arg(dir.path())
        .arg("app.ts")
        .env(
            "TSRUN_TRANSFORM_CMD",
            format!("sh {}", dir.path().join("transform.sh").display()),
        )
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "42\n");
}
