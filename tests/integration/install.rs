use anyhow::Result;
use fkey_updater::config::UpdaterConfig;
use fkey_updater::core::ErrorKind;
use fkey_updater::test_utils::{FakeVersionSource, ZipFixture, fake_executable};
use fkey_updater::upgrade::{Platform, SelfReplaceOrchestrator, UpdaterService};
use std::fs;
use std::path::Path;
#[cfg(unix)]
use std::{path::PathBuf, time::Duration};
use tempfile::TempDir;

fn orchestrator(temp: &Path, platform: Platform) -> Result<SelfReplaceOrchestrator> {
    let app_dir = temp.join("app");
    fs::create_dir_all(&app_dir)?;
    let current = fake_executable(&app_dir, "FKey.exe", b"old build")?;

    Ok(SelfReplaceOrchestrator::new("FKey")
        .with_platform(platform)
        .with_temp_dir(temp)
        .with_current_executable(current))
}

#[tokio::test]
async fn test_prepare_writes_windows_script() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;
    let orchestrator = orchestrator(temp.path(), Platform::Windows)?;

    let prepared = orchestrator.prepare(&archive).await?;

    assert_eq!(prepared.script_path, temp.path().join("fkey-updater.bat"));
    assert_eq!(prepared.plan.scratch_dir, temp.path().join("fkey-update-extract"));
    assert_eq!(prepared.plan.new_executable, prepared.plan.scratch_dir.join("FKey.exe"));
    assert_eq!(prepared.plan.current_executable, temp.path().join("app").join("FKey.exe"));

    let script = fs::read_to_string(&prepared.script_path)?;
    assert!(script.contains("\r\n"));
    assert!(script.contains(&prepared.plan.current_executable.to_string_lossy().to_string()));
    assert_eq!(script.trim_end().lines().last(), Some("del \"%~f0\""));

    // The scratch directory stays for the script to copy from
    assert!(prepared.plan.new_executable.exists());
    assert!(archive.exists());

    Ok(())
}

#[tokio::test]
async fn test_prepare_install_returns_script_path() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;
    let orchestrator = orchestrator(temp.path(), Platform::Linux)?;

    let script = orchestrator.prepare_install(&archive).await?;
    assert_eq!(script, temp.path().join("fkey-updater.sh"));

    let content = fs::read_to_string(&script)?;
    assert!(content.starts_with("#!/bin/sh\n"));
    assert_eq!(content.trim_end().lines().last(), Some("rm -f \"$0\""));

    Ok(())
}

#[tokio::test]
async fn test_archive_without_executable_is_not_found() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = ZipFixture::new()
        .file("README.txt", b"docs only")
        .file("lib/data.bin", b"data")
        .write_to(&temp.path().join("pkg.zip"))?;
    let orchestrator = orchestrator(temp.path(), Platform::current())?;

    let err = orchestrator.prepare_install(&archive).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!temp.path().join(Platform::current().script_file_name()).exists());

    Ok(())
}

#[tokio::test]
async fn test_corrupt_archive() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = temp.path().join("pkg.zip");
    fs::write(&archive, b"PK but not really")?;
    let orchestrator = orchestrator(temp.path(), Platform::Windows)?;

    let err = orchestrator.prepare_install(&archive).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptArchive);

    Ok(())
}

#[tokio::test]
async fn test_stale_scratch_is_cleared_first() -> Result<()> {
    let temp = TempDir::new()?;
    let scratch = temp.path().join("fkey-update-extract");
    fs::create_dir_all(&scratch)?;
    fs::write(scratch.join("A-stale.exe"), b"left over")?;

    let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;
    let orchestrator = orchestrator(temp.path(), Platform::Windows)?;

    let prepared = orchestrator.prepare(&archive).await?;
    assert_eq!(prepared.plan.new_executable, scratch.join("FKey.exe"));
    assert!(!scratch.join("A-stale.exe").exists());

    Ok(())
}

#[tokio::test]
async fn test_service_install_update() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;

    let service =
        UpdaterService::with_source(UpdaterConfig::new("1.2.0"), FakeVersionSource::new("1.3.0"))?
            .with_orchestrator(orchestrator(temp.path(), Platform::Windows)?);

    let script = service.install_update(&archive).await?;
    assert_eq!(script, temp.path().join("fkey-updater.bat"));

    Ok(())
}

#[tokio::test]
async fn test_service_replaces_configured_target() -> Result<()> {
    let temp = TempDir::new()?;
    let archive = ZipFixture::portable("FKey").write_to(&temp.path().join("pkg.zip"))?;
    let app_dir = temp.path().join("app");
    fs::create_dir_all(&app_dir)?;
    let target = fake_executable(&app_dir, "FKey.exe", b"old build")?;

    let config = UpdaterConfig::new("1.2.0").with_target_executable(&target);
    let service = UpdaterService::with_source(config, FakeVersionSource::new("1.3.0"))?
        .with_temp_dir(temp.path());

    let script = service.install_update(&archive).await?;
    let content = fs::read_to_string(&script)?;
    assert!(content.contains(&*target.to_string_lossy()));
    assert_eq!(service.script_log_path(), temp.path().join("fkey-updater.log"));

    Ok(())
}

/// Stand-in install on Linux: `app/FKey` plus a `zip -r` style archive.
#[cfg(unix)]
struct LinuxInstall {
    current: PathBuf,
    archive: PathBuf,
    orchestrator: SelfReplaceOrchestrator,
}

#[cfg(unix)]
fn linux_install(temp: &Path) -> Result<LinuxInstall> {
    let app_dir = temp.join("app");
    fs::create_dir_all(&app_dir)?;
    let current = fake_executable(&app_dir, "FKey", b"#!/bin/sh\necho old build\n")?;

    let archive = ZipFixture::new()
        .dir("FKey/")
        .executable("FKey/FKey", b"#!/bin/sh\nexit 0\n")
        .file("FKey/README.txt", b"notes")
        .write_to(&temp.join("fkey-update-pkg.zip"))?;

    let orchestrator = SelfReplaceOrchestrator::new("FKey")
        .with_platform(Platform::Linux)
        .with_temp_dir(temp)
        .with_current_executable(&current);

    Ok(LinuxInstall {
        current,
        archive,
        orchestrator,
    })
}

/// Poll `done` every 100ms until it holds or `limit` passes.
#[cfg(unix)]
async fn wait_for(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    done()
}

#[cfg(unix)]
#[tokio::test]
async fn test_directory_entry_named_like_executable() -> Result<()> {
    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;

    let prepared = install.orchestrator.prepare(&install.archive).await?;
    assert_eq!(prepared.plan.new_executable, prepared.plan.scratch_dir.join("FKey"));
    assert!(prepared.plan.new_executable.is_file());

    Ok(())
}

/// Runs the generated sh script to completion against a stand-in executable.
#[cfg(unix)]
#[tokio::test]
async fn test_sh_script_swaps_executable_and_cleans_up() -> Result<()> {
    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;
    let prepared = install.orchestrator.prepare(&install.archive).await?;

    let status = tokio::process::Command::new("sh")
        .arg(&prepared.script_path)
        .current_dir(temp.path())
        .status()
        .await?;
    assert!(status.success());

    assert_eq!(fs::read(&install.current)?, b"#!/bin/sh\nexit 0\n");
    assert!(!install.archive.exists());
    assert!(!prepared.plan.scratch_dir.exists());
    assert!(!prepared.script_path.exists());
    assert!(!install.orchestrator.log_path().exists());

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_launch_install_completes_swap() -> Result<()> {
    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;
    let prepared = install.orchestrator.prepare(&install.archive).await?;

    install.orchestrator.launch_install(&prepared.script_path)?;

    let script = prepared.script_path.clone();
    assert!(wait_for(Duration::from_secs(20), || !script.exists()).await);
    assert_eq!(fs::read(&install.current)?, b"#!/bin/sh\nexit 0\n");
    assert!(!install.archive.exists());
    assert!(!prepared.plan.scratch_dir.exists());

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_copy_waits_for_user_and_logs() -> Result<()> {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;
    let prepared = install.orchestrator.prepare(&install.archive).await?;
    fs::remove_dir_all(&prepared.plan.scratch_dir)?;

    let mut command = tokio::process::Command::from(
        Platform::Linux.launch_command(&prepared.script_path),
    );
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let log = install.orchestrator.log_path();
    assert!(wait_for(Duration::from_secs(15), || log.exists()).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(child.try_wait()?.is_none(), "script exited without waiting for the user");

    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"\n").await?;
    drop(stdin);
    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output()).await??;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Update failed: could not copy"), "{stderr}");
    assert!(fs::read_to_string(&log)?.contains("Update failed: could not copy"));
    assert!(prepared.script_path.exists());

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_launched_script_failure_is_logged() -> Result<()> {
    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;
    let prepared = install.orchestrator.prepare(&install.archive).await?;
    fs::remove_dir_all(&prepared.plan.scratch_dir)?;

    install.orchestrator.launch_install(&prepared.script_path)?;

    let log = install.orchestrator.log_path();
    let logged = wait_for(Duration::from_secs(20), || {
        fs::read_to_string(&log).is_ok_and(|content| content.contains("Update failed"))
    })
    .await;
    assert!(logged);
    assert!(prepared.script_path.exists());

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_prepare_clears_previous_failure_log() -> Result<()> {
    let temp = TempDir::new()?;
    let install = linux_install(temp.path())?;
    fs::write(install.orchestrator.log_path(), b"Update failed: earlier attempt")?;

    install.orchestrator.prepare(&install.archive).await?;
    assert!(!install.orchestrator.log_path().exists());

    Ok(())
}
