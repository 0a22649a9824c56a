use anyhow::Context as _;
use std::path::Path;
use std::process::Command;
use std::process::Output;

type Result<T = (), E = anyhow::Error> = core::result::Result<T, E>;

fn run_thinlink(dir: &Path, request: &str) -> Result<Output> {
    let path = dir.join("request.toml");
    std::fs::write(&path, request)?;
    Command::new(env!("CARGO_BIN_EXE_thinlink"))
        .arg(&path)
        .env_remove("RUST_LOG")
        .output()
        .context("Failed to run thinlink")
}

#[test]
fn prints_plan() -> Result {
    let dir = tempfile::tempdir()?;
    let output = run_thinlink(
        dir.path(),
        r#"
        [target]
        owner = "//app:app"
        output = "app/app"
        link_type = "executable"

        [[objects]]
        path = "app/main.o"
        "#,
    )?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains("mnemonic = \"CppLink\""));
    assert!(stdout.contains("bin/app/main.o"));
    Ok(())
}

#[test]
fn usage_errors_exit_with_2() -> Result {
    let dir = tempfile::tempdir()?;
    let output = run_thinlink(
        dir.path(),
        r#"
        [target]
        owner = "//lib:lib"
        output = "lib/liblib.a"
        link_type = "static-library"
        identifier = "lib/lib"
        interface_output = "lib/liblib.ifso"
        "#,
    )?;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Interface output can only be used with dynamic library targets"));
    Ok(())
}

#[test]
fn missing_request_file() -> Result {
    let dir = tempfile::tempdir()?;
    let output = Command::new(env!("CARGO_BIN_EXE_thinlink"))
        .arg(dir.path().join("missing.toml"))
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr)?.contains("Failed to read"));
    Ok(())
}
