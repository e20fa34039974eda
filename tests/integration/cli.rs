use anyhow::Result;
use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use fkey_updater::test_utils::{CannedResponse, TestHttpServer, ZipFixture, fake_executable};
use fkey_updater::upgrade::Platform;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fkey_updater(config: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("fkey-updater")?;
    cmd.env("NO_COLOR", "1")
        .env("FKEY_NO_PROGRESS", "1")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    Ok(cmd)
}

/// Run off the async runtime so the test server keeps serving.
async fn run(mut cmd: Command) -> Result<Output> {
    Ok(tokio::task::spawn_blocking(move || cmd.output()).await??)
}

fn write_config(dir: &Path, server: &TestHttpServer) -> Result<PathBuf> {
    let path = dir.join("updater.toml");
    std::fs::write(
        &path,
        format!(
            "current_version = \"1.2.0\"\nversion_url_template = \"{}\"\n",
            server.url("/VERSION")
        ),
    )?;
    Ok(path)
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    let mut cmd = Command::cargo_bin("fkey-updater")?;
    cmd.arg("--help")
        .output()?
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("upgrade"))
        .stdout(predicate::str::contains("compare"));
    Ok(())
}

#[test]
fn test_compare_newer() -> Result<()> {
    let mut cmd = Command::cargo_bin("fkey-updater")?;
    cmd.env("NO_COLOR", "1")
        .args(["compare", "1.2.0", "v1.3.0"])
        .output()?
        .assert()
        .success()
        .stdout(predicate::str::contains("1.3.0 is newer than 1.2.0"));
    Ok(())
}

#[test]
fn test_compare_not_newer() -> Result<()> {
    let mut cmd = Command::cargo_bin("fkey-updater")?;
    cmd.env("NO_COLOR", "1")
        .args(["compare", "1.10.0", "1.9.9"])
        .output()?
        .assert()
        .success()
        .stdout(predicate::str::contains("1.9.9 is not newer than 1.10.0"));
    Ok(())
}

#[tokio::test]
async fn test_check_json() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("v1.3.0\n"));
    let temp = TempDir::new()?;
    let config = write_config(temp.path(), &server)?;

    let mut cmd = fkey_updater(&config)?;
    cmd.args(["check", "--json"]);
    let output = run(cmd).await?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["available"], true);
    assert_eq!(json["currentVersion"], "1.2.0");
    assert_eq!(json["latestVersion"], "v1.3.0");
    assert_eq!(server.hits("/VERSION"), 1);

    Ok(())
}

#[tokio::test]
async fn test_check_text_up_to_date() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/VERSION", CannedResponse::ok("1.2.0"));
    let temp = TempDir::new()?;
    let config = write_config(temp.path(), &server)?;

    let mut cmd = fkey_updater(&config)?;
    cmd.arg("check");
    run(cmd)
        .await?
        .assert()
        .success()
        .stdout(predicate::str::contains("You are on the latest version (1.2.0)"));

    Ok(())
}

#[tokio::test]
async fn test_check_missing_version_file_fails() -> Result<()> {
    let server = TestHttpServer::start().await?;
    let temp = TempDir::new()?;
    let config = write_config(temp.path(), &server)?;

    let mut cmd = fkey_updater(&config)?;
    cmd.arg("check");
    run(cmd)
        .await?
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"))
        .stderr(predicate::str::contains("suggestion"));

    Ok(())
}

#[tokio::test]
async fn test_download_explicit_url() -> Result<()> {
    let server = TestHttpServer::start().await?;
    server.route("/cli-pkg.zip", CannedResponse::ok(vec![7u8; 4096]));
    let temp = TempDir::new()?;
    let config = write_config(temp.path(), &server)?;
    let downloads = temp.path().join("downloads");
    std::fs::create_dir_all(&downloads)?;

    let mut cmd = fkey_updater(&config)?;
    cmd.env("TMPDIR", &downloads)
        .env("TMP", &downloads)
        .env("TEMP", &downloads)
        .args(["download", "--url", &server.url("/cli-pkg.zip")]);
    run(cmd).await?.assert().success().stdout(predicate::str::contains("fkey-update-cli-pkg.zip"));

    assert_eq!(std::fs::read(downloads.join("fkey-update-cli-pkg.zip"))?.len(), 4096);

    Ok(())
}

#[test]
fn test_status_offline() -> Result<()> {
    let temp = TempDir::new()?;
    let config = temp.path().join("absent.toml");

    let mut cmd = fkey_updater(&config)?;
    cmd.args(["status", "--offline"])
        .output()?
        .assert()
        .success()
        .stdout(predicate::str::contains("Current version:"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("miken90/fkey"));

    Ok(())
}

#[test]
fn test_invalid_config_fails() -> Result<()> {
    let temp = TempDir::new()?;
    let config = temp.path().join("updater.toml");
    std::fs::write(&config, "check_interval_secs = \"soon\"")?;

    let mut cmd = fkey_updater(&config)?;
    cmd.args(["status", "--offline"])
        .output()?
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));

    Ok(())
}

/// Release archive, stand-in FKey install and a private temp dir for the script.
struct InstallFixture {
    temp: TempDir,
    archive: PathBuf,
    target: PathBuf,
    scratch: PathBuf,
}

impl InstallFixture {
    fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;
        let app_dir = temp.path().join("app");
        std::fs::create_dir_all(&app_dir)?;
        let target = fake_executable(&app_dir, "FKey", b"old build")?;
        let scratch = temp.path().join("tmp");
        std::fs::create_dir_all(&scratch)?;
        Ok(Self {
            temp,
            archive,
            target,
            scratch,
        })
    }

    fn command(&self, config: &Path) -> Result<Command> {
        let mut cmd = fkey_updater(config)?;
        cmd.env("TMPDIR", &self.scratch)
            .env("TMP", &self.scratch)
            .env("TEMP", &self.scratch)
            .arg("install")
            .arg(&self.archive)
            .arg("--no-launch");
        Ok(cmd)
    }

    fn script(&self) -> PathBuf {
        self.scratch.join(Platform::current().script_file_name())
    }
}

#[test]
fn test_install_no_launch_replaces_target() -> Result<()> {
    let fixture = InstallFixture::new()?;
    let config = fixture.temp.path().join("absent.toml");

    let mut cmd = fixture.command(&config)?;
    cmd.arg("--target").arg(&fixture.target);
    cmd.output()?
        .assert()
        .success()
        .stdout(predicate::str::contains("Replacement script written to"));

    let script = std::fs::read_to_string(fixture.script())?;
    assert!(script.contains(&*fixture.target.to_string_lossy()), "{script}");
    let updater = assert_cmd::cargo::cargo_bin("fkey-updater");
    assert!(!script.contains(&*updater.to_string_lossy()), "{script}");

    Ok(())
}

#[test]
fn test_install_uses_configured_target() -> Result<()> {
    let fixture = InstallFixture::new()?;
    let config = fixture.temp.path().join("updater.toml");
    std::fs::write(&config, format!("target_executable = '{}'\n", fixture.target.display()))?;

    fixture.command(&config)?.output()?.assert().success();

    let script = std::fs::read_to_string(fixture.script())?;
    assert!(script.contains(&*fixture.target.to_string_lossy()), "{script}");

    Ok(())
}

#[test]
fn test_install_without_target_refuses() -> Result<()> {
    let fixture = InstallFixture::new()?;
    let config = fixture.temp.path().join("absent.toml");

    fixture
        .command(&config)?
        .output()?
        .assert()
        .failure()
        .stderr(predicate::str::contains("--target"));
    assert!(!fixture.script().exists());

    Ok(())
}
