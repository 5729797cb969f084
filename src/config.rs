//! Optional config file and environment overrides.
//!
//! Settings live in `$HOME/.boost-installer/config.toml`. The file is optional;
//! every field can also be supplied through an environment variable, and the
//! mirror URL through `--mirror-url`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base URL of the Boost release archive.
pub const DEFAULT_MIRROR_URL: &str = "https://archives.boost.io/release";

/// Environment variable overriding the mirror base URL.
const MIRROR_URL_ENV_VAR: &str = "BOOST_INSTALLER_MIRROR_URL";

/// Environment variable overriding the download/extract directory.
const TEMP_DIR_ENV_VAR: &str = "BOOST_INSTALLER_TEMP_DIR";

/// Config directory under `$HOME/`.
const CONFIG_DIR_NAME: &str = ".boost-installer";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Persisted installer configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Base URL releases are fetched from (`<mirror>/<ver>/source/<archive>`).
    pub mirror_url: Option<String>,
    /// Where archives are downloaded and extracted.
    pub temp_dir: Option<PathBuf>,
}

/// Per-run environment resolved from CLI flags, env vars and the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mirror_url: String,
    pub temp_dir: PathBuf,
}

impl InstallerConfig {
    /// `$HOME/.boost-installer/config.toml`, or `None` without `$HOME`.
    pub fn config_path() -> Option<PathBuf> {
        Some(Self::config_path_with_home(home_dir()?.as_path()))
    }

    fn config_path_with_home(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load config from disk. Returns defaults if the file does not exist.
    ///
    /// Parse errors and I/O errors other than not-found are hard failures.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
            }
        }
    }

    /// Resolve the run settings.
    ///
    /// Mirror URL priority (highest wins): `cli_mirror`,
    /// `BOOST_INSTALLER_MIRROR_URL`, `mirror_url` from the file, the default.
    /// Temp dir priority: `BOOST_INSTALLER_TEMP_DIR`, `temp_dir` from the file,
    /// the platform temp directory. Blank values fall through.
    pub fn resolve(&self, cli_mirror: Option<&str>) -> Settings {
        self.resolve_with_env(
            cli_mirror,
            std::env::var(MIRROR_URL_ENV_VAR).ok(),
            std::env::var(TEMP_DIR_ENV_VAR).ok(),
        )
    }

    fn resolve_with_env(
        &self,
        cli_mirror: Option<&str>,
        env_mirror: Option<String>,
        env_temp_dir: Option<String>,
    ) -> Settings {
        let mirror_url = non_empty_trimmed(cli_mirror.map(str::to_string))
            .or_else(|| non_empty_trimmed(env_mirror))
            .or_else(|| non_empty_trimmed(self.mirror_url.clone()))
            .unwrap_or_else(|| DEFAULT_MIRROR_URL.to_string());

        let temp_dir = non_empty_trimmed(env_temp_dir)
            .map(PathBuf::from)
            .or_else(|| {
                self.temp_dir
                    .clone()
                    .filter(|p| !p.as_os_str().is_empty())
            })
            .unwrap_or_else(std::env::temp_dir);

        Settings {
            mirror_url: mirror_url.trim_end_matches('/').to_string(),
            temp_dir,
        }
    }
}

/// Return the trimmed value if non-empty after trimming, otherwise `None`.
fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Resolve the user's home directory from the `HOME` environment variable.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
