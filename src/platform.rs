//! Platform-specific pieces of an install: command names, default prefix and
//! toolset, and how the extraction directory is removed.
//!
//! The two families are Unix-like hosts and Windows. The host family is taken
//! from the compile-time target triple (see `build.rs`).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::InstallError;

/// Parallel jobs passed to b2.
pub const BUILD_JOBS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Unix,
    Windows,
}

impl PlatformFamily {
    /// Windows targets contain `windows` in their triple; everything else is
    /// treated as Unix-like.
    pub fn from_target(target: &str) -> Self {
        if target.contains("windows") {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// Returns the compile-time target triple (e.g., "x86_64-unknown-linux-gnu").
pub fn build_target() -> &'static str {
    env!("TARGET")
}

/// The [`PlatformOps`] for the platform this binary was built for.
pub fn host() -> &'static dyn PlatformOps {
    match PlatformFamily::from_target(build_target()) {
        PlatformFamily::Windows => &WindowsOps,
        PlatformFamily::Unix => &UnixOps,
    }
}

// ---------------------------------------------------------------------------
// External commands
// ---------------------------------------------------------------------------

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run through the platform shell instead of spawning `program` directly.
    pub shell: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            shell: false,
        }
    }

    pub fn via_shell(mut self) -> Self {
        self.shell = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status of an external command. `code` is `None` when the process was
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    pub code: Option<i32>,
}

impl ToolExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands. The installer only talks to processes through this.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec, cwd: &Path) -> io::Result<ToolExit>;
}

/// Spawns real processes, inheriting stdio so build output reaches the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, cwd: &Path) -> io::Result<ToolExit> {
        let mut cmd = if spec.shell {
            shell_command(spec)
        } else {
            let mut cmd = Command::new(resolve_program(&spec.program, cwd));
            cmd.args(&spec.args);
            cmd
        };

        tracing::debug!(command = %spec, cwd = %cwd.display(), "spawning");
        let status = cmd.current_dir(cwd).status()?;
        Ok(ToolExit {
            code: status.code(),
        })
    }
}

/// Relative programs with a directory part (`./b2`) are looked up in the
/// child's working directory rather than the caller's.
fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(windows)]
fn shell_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(&spec.program).args(&spec.args);
    cmd
}

#[cfg(not(windows))]
fn shell_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(spec.to_string());
    cmd
}

// ---------------------------------------------------------------------------
// Platform operations
// ---------------------------------------------------------------------------

/// Everything that differs between platform families.
pub trait PlatformOps: Sync {
    fn family(&self) -> PlatformFamily;

    fn default_toolset(&self) -> &'static str;

    /// Install prefix used when `--path` is not given. `version` is dotted.
    fn default_prefix(&self, version: &str, home: Option<&Path>) -> Result<PathBuf, InstallError>;

    fn bootstrap_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec;

    fn build_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec;

    /// External command used to delete `dir` recursively, or `None` to remove
    /// it in-process.
    fn remove_dir_command(&self, dir: &Path) -> Option<CommandSpec>;
}

fn build_args(toolset: &str, prefix_arg: &str) -> Vec<String> {
    vec![
        format!("toolset={toolset}"),
        "install".to_string(),
        prefix_arg.to_string(),
        format!("-j{BUILD_JOBS}"),
    ]
}

/// Linux, macOS and the BSDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixOps;

impl PlatformOps for UnixOps {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Unix
    }

    fn default_toolset(&self) -> &'static str {
        "gcc"
    }

    fn default_prefix(&self, version: &str, home: Option<&Path>) -> Result<PathBuf, InstallError> {
        let home = home.ok_or(InstallError::NoHomeDirectory)?;
        Ok(home.join(".local").join(format!("boost_{version}")))
    }

    fn bootstrap_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec {
        CommandSpec::new(
            "./bootstrap.sh",
            vec![format!("--with-toolset={toolset}"), prefix_arg.to_string()],
        )
    }

    fn build_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec {
        CommandSpec::new("./b2", build_args(toolset, prefix_arg))
    }

    // Extracted trees can contain read-only files that fs::remove_dir_all
    // trips over; rm -rf does not.
    fn remove_dir_command(&self, dir: &Path) -> Option<CommandSpec> {
        Some(CommandSpec::new(
            "rm",
            vec!["-rf".to_string(), dir.display().to_string()],
        ))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsOps;

impl PlatformOps for WindowsOps {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Windows
    }

    fn default_toolset(&self) -> &'static str {
        "msvc"
    }

    fn default_prefix(&self, version: &str, _home: Option<&Path>) -> Result<PathBuf, InstallError> {
        Ok(PathBuf::from(format!(r"C:\boost\boost_{version}")))
    }

    fn bootstrap_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec {
        CommandSpec::new(
            "bootstrap.bat",
            vec![format!("--with-toolset={toolset}"), prefix_arg.to_string()],
        )
        .via_shell()
    }

    // b2.exe is only found when started through cmd.
    fn build_command(&self, toolset: &str, prefix_arg: &str) -> CommandSpec {
        CommandSpec::new("b2.exe", build_args(toolset, prefix_arg)).via_shell()
    }

    fn remove_dir_command(&self, _dir: &Path) -> Option<CommandSpec> {
        None
    }
}
