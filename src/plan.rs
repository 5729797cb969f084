//! Request parsing results and the per-run plan derived from them.

use std::path::{Component, Path, PathBuf};

use crate::config::Settings;
use crate::error::InstallError;
use crate::platform::PlatformOps;

/// Name prefix of every Boost source archive and its top-level directory.
const ARCHIVE_PREFIX: &str = "boost_";

/// Source archive extension.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRequest {
    /// Boost version, e.g. `1.75` or `1.75.0`.
    pub version: String,
    pub toolset: Option<String>,
    /// Install destination. Platform default when absent.
    pub path: Option<PathBuf>,
    pub keep_download: bool,
    pub download_only: bool,
    /// Expected SHA-256 of the archive (hex).
    pub sha256: Option<String>,
}

impl InstallRequest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

/// Everything needed to fetch and unpack one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    /// Dotted version with a patch component, e.g. `1.75.0`.
    pub version: String,
    /// `1_75_0`
    pub version_underscored: String,
    pub temp_dir: PathBuf,
    /// `boost_1_75_0.tar.gz`
    pub archive_name: String,
    pub url: String,
    pub archive_path: PathBuf,
    /// Where the archive's top-level directory lands once extracted.
    pub extract_dir: PathBuf,
}

/// Where and with what compiler the build installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub prefix: PathBuf,
    /// `--prefix=<prefix>`, passed to both bootstrap and b2.
    pub prefix_arg: String,
    pub toolset: String,
}

impl ResolvedPlan {
    /// Derives names, URL and local paths for `request.version`.
    ///
    /// The only validation is that the version is non-empty; a malformed
    /// version surfaces later as a download error.
    pub fn resolve(request: &InstallRequest, settings: &Settings) -> Result<Self, InstallError> {
        let version = dotted_version(&request.version)?;
        let version_underscored = version.replace('.', "_");
        let archive_name = archive_name(&version_underscored);
        let url = format!(
            "{}/{version}/source/{archive_name}",
            settings.mirror_url.trim_end_matches('/')
        );
        let temp_dir = settings.temp_dir.clone();
        let archive_path = temp_dir.join(&archive_name);
        let extract_dir = temp_dir.join(extract_dir_name(&archive_name));

        Ok(Self {
            version,
            version_underscored,
            temp_dir,
            archive_name,
            url,
            archive_path,
            extract_dir,
        })
    }
}

/// `1.75` → `1.75.0`. Versions that already carry a patch component are
/// kept as given.
pub fn dotted_version(version: &str) -> Result<String, InstallError> {
    let version = version.trim();
    if version.is_empty() {
        return Err(InstallError::InvalidVersion);
    }
    if version.split('.').count() >= 3 {
        Ok(version.to_string())
    } else {
        Ok(format!("{version}.0"))
    }
}

pub fn archive_name(version_underscored: &str) -> String {
    format!("{ARCHIVE_PREFIX}{version_underscored}{ARCHIVE_EXTENSION}")
}

/// Top-level directory name inside an archive: the file name without
/// `.tar.gz` (or without its last extension for anything else).
pub fn extract_dir_name(archive_name: &str) -> &str {
    archive_name
        .strip_suffix(ARCHIVE_EXTENSION)
        .or_else(|| archive_name.rsplit_once('.').map(|(stem, _)| stem))
        .unwrap_or(archive_name)
}

/// Picks the install prefix: the user's path normalized, else the platform
/// default for `version`.
pub fn resolve_install_prefix(
    user_path: Option<&Path>,
    version: &str,
    platform: &dyn PlatformOps,
    home: Option<&Path>,
) -> Result<PathBuf, InstallError> {
    let path = match user_path.filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p.to_path_buf(),
        None => platform.default_prefix(version, home)?,
    };
    Ok(normalize_path(&path))
}

pub fn prefix_arg(prefix: &Path) -> String {
    format!("--prefix={}", prefix.display())
}

/// User toolset unchanged, else the platform default.
pub fn resolve_toolset(user_toolset: Option<&str>, platform: &dyn PlatformOps) -> String {
    match user_toolset.map(str::trim).filter(|t| !t.is_empty()) {
        Some(toolset) => toolset.to_string(),
        None => platform.default_toolset().to_string(),
    }
}

/// Lexically normalizes a path: collapses repeated separators, drops `.`
/// components and folds `..` into its parent where there is one. The
/// filesystem is never consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut normal_depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                out.push(component.as_os_str());
                normal_depth = 0;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if normal_depth > 0 {
                    out.pop();
                    normal_depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => {
                out.push(part);
                normal_depth += 1;
            }
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
