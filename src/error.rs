//! Error taxonomy for an install run.
//!
//! Every fatal failure of the pipeline is an [`InstallError`]. The binary maps
//! each kind to its own process exit code via [`InstallError::exit_code`] so
//! scripts can tell a bad invocation from a network outage or a failed build.

use std::path::PathBuf;

/// Exit code for a bad invocation (missing/empty version, no `$HOME`).
pub const EXIT_VALIDATION: i32 = 2;
/// Exit code when the archive could not be fetched.
pub const EXIT_NETWORK: i32 = 3;
/// Exit code for local filesystem failures.
pub const EXIT_IO: i32 = 4;
/// Exit code when the archive tried to write outside the extraction root.
pub const EXIT_PATH_TRAVERSAL: i32 = 5;
/// Exit code when the archive digest does not match `--sha256`.
pub const EXIT_CHECKSUM: i32 = 6;
/// Exit code when bootstrap or b2 could not be run or failed.
pub const EXIT_EXTERNAL_TOOL: i32 = 7;
/// Exit code for cleanup failures. Cleanup never aborts a run, so this only
/// shows up if a caller chooses to propagate one.
pub const EXIT_CLEANUP: i32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Boost version must not be empty")]
    InvalidVersion,

    #[error("cannot derive a default install path: $HOME is not set (pass --path)")]
    NoHomeDirectory,

    #[error("failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "archive entry '{}' resolves outside of {} (attempted path traversal)",
        .entry.display(),
        .target.display()
    )]
    PathTraversal { entry: PathBuf, target: PathBuf },

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to run {step} command `{command}`")]
    ToolSpawn {
        step: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} command `{command}` failed ({})", describe_status(.code))]
    ExternalTool {
        step: &'static str,
        command: String,
        code: Option<i32>,
    },

    #[error("could not remove {}: {reason}", .path.display())]
    Cleanup { path: PathBuf, reason: String },
}

impl InstallError {
    /// Wraps an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidVersion | Self::NoHomeDirectory => EXIT_VALIDATION,
            Self::Network { .. } => EXIT_NETWORK,
            Self::Io { .. } => EXIT_IO,
            Self::PathTraversal { .. } => EXIT_PATH_TRAVERSAL,
            Self::ChecksumMismatch { .. } => EXIT_CHECKSUM,
            Self::ToolSpawn { .. } | Self::ExternalTool { .. } => EXIT_EXTERNAL_TOOL,
            Self::Cleanup { .. } => EXIT_CLEANUP,
        }
    }
}

fn describe_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
