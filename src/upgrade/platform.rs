//! Per-operating-system capabilities used by the installer.
//!
//! A process cannot reliably overwrite its own running image, so the swap is
//! handed to a generated shell script. Everything that differs by operating
//! system lives behind [`Platform`]: locating the running executable,
//! recognising a native executable inside the extracted release, rendering
//! the replacement script, launching it detached, and opening URLs.
//!
//! The variant is chosen once with [`Platform::current`]; any variant can be
//! constructed on any host, which keeps script rendering testable everywhere.

use crate::constants::{
    SCRIPT_BASE_NAME, SCRIPT_INITIAL_DELAY_SECS, SCRIPT_LOG_NAME, SCRIPT_MAX_DELETE_ATTEMPTS,
    SCRIPT_RETRY_DELAY_SECS,
};
use crate::core::{Result, UpdateError};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Target operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Windows: `.exe` binaries, batch scripts, `cmd /C`.
    Windows,
    /// macOS: POSIX sh scripts, `open`.
    MacOs,
    /// Linux and other Unix-likes: POSIX sh scripts, `xdg-open`.
    Linux,
}

/// The four paths a replacement script works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPlan {
    /// Product name shown while the script runs.
    pub product: String,
    /// Executable being replaced.
    pub current_executable: PathBuf,
    /// Freshly extracted executable to copy into place.
    pub new_executable: PathBuf,
    /// Downloaded archive, removed after the swap.
    pub archive: PathBuf,
    /// Scratch extraction directory, removed after the swap.
    pub scratch_dir: PathBuf,
}

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Absolute path of the running executable.
    pub fn current_executable(self) -> Result<PathBuf> {
        let exe = std::env::current_exe()
            .map_err(|e| UpdateError::io("locate", "current executable", e))?;
        // canonicalize() would give Windows verbatim paths that cmd.exe cannot use
        std::path::absolute(&exe).map_err(|e| UpdateError::io("resolve", exe, e))
    }

    /// Whether `path` is a native executable for this platform.
    ///
    /// Windows matches the `.exe` extension case-insensitively. On Unix-likes
    /// a native executable is an extension-less regular file with an execute
    /// bit set.
    #[must_use]
    pub fn is_native_executable(self, path: &Path) -> bool {
        match self {
            Self::Windows => {
                path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
            }
            Self::MacOs | Self::Linux => path.extension().is_none() && has_exec_bit(path),
        }
    }

    /// Extension of the replacement script.
    #[must_use]
    pub const fn script_extension(self) -> &'static str {
        match self {
            Self::Windows => "bat",
            Self::MacOs | Self::Linux => "sh",
        }
    }

    /// File name of the replacement script.
    #[must_use]
    pub fn script_file_name(self) -> String {
        format!("{SCRIPT_BASE_NAME}.{}", self.script_extension())
    }

    /// Render the replacement script for `plan`.
    ///
    /// The script waits briefly, retries deleting the current executable until
    /// the OS releases it (bounded), copies the new executable into place,
    /// starts it, removes the archive and scratch directory, and deletes
    /// itself as its final statement. A failed copy, or running out of
    /// delete attempts, prints the reason, appends it to the log next to the
    /// script and waits for the user before exiting with status 1.
    #[must_use]
    pub fn render_script(self, plan: &ReplacementPlan) -> String {
        match self {
            Self::Windows => render_batch(plan),
            Self::MacOs | Self::Linux => render_sh(plan),
        }
    }

    /// Command that runs `script` detached from the current process.
    ///
    /// On Windows the script gets its own console window through
    /// `start "" cmd /C`, so its failure message and `pause` stay on screen
    /// after this process exits. On Unix-likes the script runs in its own
    /// process group with stdin closed and stdout/stderr inherited.
    #[must_use]
    pub fn launch_command(self, script: &Path) -> Command {
        let mut command = match self {
            Self::Windows => {
                let mut c = Command::new("cmd");
                c.args(["/C", "start", "", "cmd", "/C"]).arg(script);
                c
            }
            Self::MacOs | Self::Linux => {
                let mut c = Command::new("sh");
                c.arg(script);
                c
            }
        };

        if let Some(dir) = script.parent()
            && !dir.as_os_str().is_empty()
        {
            command.current_dir(dir);
        }
        command.stdin(Stdio::null());
        detach(&mut command);
        command
    }

    /// Command that opens `url` in the default handler.
    #[must_use]
    pub fn open_url_command(self, url: &str) -> Command {
        let mut command = match self {
            Self::Windows => {
                let mut c = Command::new("rundll32");
                c.arg("url.dll,FileProtocolHandler");
                c
            }
            Self::MacOs => Command::new("open"),
            Self::Linux => Command::new("xdg-open"),
        };
        command.arg(url);
        command
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    // The outer cmd only runs `start`; the script gets a fresh console from it
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

#[cfg(unix)]
fn has_exec_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn has_exec_bit(path: &Path) -> bool {
    path.is_file()
}

/// Quote a path for a batch file. `%` must be doubled or cmd expands it.
fn batch_quote(path: &Path) -> String {
    format!("\"{}\"", path.to_string_lossy().replace('%', "%%"))
}

/// Escape free text for a batch `echo` line.
fn batch_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' => out.push_str("%%"),
            '^' | '&' | '|' | '<' | '>' | '(' | ')' => {
                out.push('^');
                out.push(c);
            }
            '\r' | '\n' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Single-quote a path for POSIX sh.
fn sh_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn render_batch(plan: &ReplacementPlan) -> String {
    let current = batch_quote(&plan.current_executable);
    let new = batch_quote(&plan.new_executable);
    let archive = batch_quote(&plan.archive);
    let scratch = batch_quote(&plan.scratch_dir);
    let log = format!("\"%~dp0{SCRIPT_LOG_NAME}\"");

    let mut s = String::new();
    let _ = writeln!(s, "@echo off");
    let _ = writeln!(s, "echo Updating {}...", batch_escape(&plan.product));
    let _ = writeln!(s, "timeout /t {SCRIPT_INITIAL_DELAY_SECS} /nobreak > nul");
    let _ = writeln!(s, "set attempts=0");
    let _ = writeln!(s, "set reason=could not remove the old executable");
    let _ = writeln!(s, "goto retry");
    let _ = writeln!(s, ":failed");
    let _ = writeln!(s, "echo Update failed: %reason%");
    let _ = writeln!(s, ">> {log} echo %date% %time% Update failed: %reason%");
    let _ = writeln!(s, "pause");
    let _ = writeln!(s, "exit /b 1");
    let _ = writeln!(s, ":retry");
    let _ = writeln!(s, "del {current} > nul 2>&1");
    let _ = writeln!(s, "if not exist {current} goto replace");
    let _ = writeln!(s, "set /a attempts+=1");
    let _ = writeln!(s, "if %attempts% geq {SCRIPT_MAX_DELETE_ATTEMPTS} goto failed");
    let _ = writeln!(s, "timeout /t {SCRIPT_RETRY_DELAY_SECS} /nobreak > nul");
    let _ = writeln!(s, "goto retry");
    let _ = writeln!(s, ":replace");
    let _ = writeln!(s, "set reason=could not copy the new executable");
    let _ = writeln!(s, "copy /y {new} {current} > nul");
    let _ = writeln!(s, "if errorlevel 1 goto failed");
    let _ = writeln!(s, "start \"\" {current}");
    let _ = writeln!(s, "del {archive} > nul 2>&1");
    let _ = writeln!(s, "rmdir /s /q {scratch} > nul 2>&1");
    let _ = writeln!(s, "del \"%~f0\"");
    s.replace('\n', "\r\n")
}

fn render_sh(plan: &ReplacementPlan) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "#!/bin/sh");
    let _ = writeln!(s, "CURRENT={}", sh_quote(&plan.current_executable));
    let _ = writeln!(s, "NEW={}", sh_quote(&plan.new_executable));
    let _ = writeln!(s, "ARCHIVE={}", sh_quote(&plan.archive));
    let _ = writeln!(s, "SCRATCH={}", sh_quote(&plan.scratch_dir));
    let _ = writeln!(s, "LOG=\"$(dirname \"$0\")/{SCRIPT_LOG_NAME}\"");
    let _ = writeln!(s, "fail() {{");
    let _ = writeln!(s, "    echo \"Update failed: $1\" >&2");
    let _ = writeln!(s, "    echo \"$(date) Update failed: $1\" >> \"$LOG\"");
    let _ = writeln!(s, "    printf 'Press Enter to close...' >&2");
    let _ = writeln!(s, "    read -r _ || true");
    let _ = writeln!(s, "    exit 1");
    let _ = writeln!(s, "}}");
    let _ = writeln!(s, "echo \"Updating {}...\"", plan.product.replace(['"', '$', '`', '\\'], ""));
    let _ = writeln!(s, "sleep {SCRIPT_INITIAL_DELAY_SECS}");
    let _ = writeln!(s, "attempts=0");
    let _ = writeln!(s, "while [ -e \"$CURRENT\" ]; do");
    let _ = writeln!(s, "    rm -f \"$CURRENT\" 2>/dev/null");
    let _ = writeln!(s, "    [ -e \"$CURRENT\" ] || break");
    let _ = writeln!(s, "    attempts=$((attempts + 1))");
    let _ = writeln!(
        s,
        "    [ \"$attempts\" -ge {SCRIPT_MAX_DELETE_ATTEMPTS} ] && fail \"could not remove $CURRENT\""
    );
    let _ = writeln!(s, "    sleep {SCRIPT_RETRY_DELAY_SECS}");
    let _ = writeln!(s, "done");
    let _ = writeln!(s, "cp \"$NEW\" \"$CURRENT\" || fail \"could not copy $NEW\"");
    let _ = writeln!(s, "chmod +x \"$CURRENT\" || fail \"could not mark $CURRENT executable\"");
    let _ = writeln!(s, "nohup \"$CURRENT\" >/dev/null 2>&1 &");
    let _ = writeln!(s, "rm -f \"$ARCHIVE\"");
    let _ = writeln!(s, "rm -rf \"$SCRATCH\"");
    let _ = writeln!(s, "rm -f \"$0\"");
    s
}
