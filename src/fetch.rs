//! Downloading and unpacking release archives.
//!
//! Downloads stream into the destination file; extraction validates every
//! entry of the archive before anything is written.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::InstallError;
use crate::plan::{extract_dir_name, normalize_path};

/// User-Agent header sent with download requests.
const USER_AGENT: &str = concat!("boost-installer/", env!("CARGO_PKG_VERSION"));

/// Boost source archives are >100 MB; give slow links room.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches and unpacks archives.
pub trait Fetcher {
    /// Fetches `url` into `dest`, replacing any existing file. Returns the
    /// number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError>;

    /// Unpacks `archive` into `target_dir` and returns the archive's top-level
    /// directory.
    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<PathBuf, InstallError>;
}

/// Production fetcher: HTTP(S) via reqwest, gzip'd tar via flate2 + tar.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError> {
        download_to_file(url, dest, self.timeout)
    }

    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<PathBuf, InstallError> {
        extract_archive(archive, target_dir)
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

fn network_error(url: &str, reason: impl std::fmt::Display) -> InstallError {
    InstallError::Network {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Downloads `url` to `dest` in a single attempt.
///
/// Connection failures and non-2xx responses are `Network` errors; failing to
/// write `dest` is an `Io` error. A partially written file is left in place.
pub fn download_to_file(url: &str, dest: &Path, timeout: Duration) -> Result<u64, InstallError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| network_error(url, format!("failed to build HTTP client: {e}")))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| InstallError::io("failed to create Tokio runtime for download", e))?;

    runtime.block_on(async move {
        let mut response = client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(network_error(url, format!("HTTP {status}")));
        }

        let mut out = File::create(dest)
            .map_err(|e| InstallError::io(format!("failed to create {}", dest.display()), e))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| network_error(url, e))? {
            out.write_all(&chunk)
                .map_err(|e| InstallError::io(format!("failed to write {}", dest.display()), e))?;
            written += chunk.len() as u64;
        }
        out.flush()
            .map_err(|e| InstallError::io(format!("failed to write {}", dest.display()), e))?;

        tracing::debug!(url, bytes = written, dest = %dest.display(), "download complete");
        Ok(written)
    })
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Computes the SHA256 digest of a file and returns it as a lowercase hex string.
pub fn sha256_file(path: &Path) -> Result<String, InstallError> {
    let context = || format!("failed to read {} for checksum", path.display());
    let mut file = File::open(path).map_err(|e| InstallError::io(context(), e))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| InstallError::io(context(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks `path` against an expected hex digest (case-insensitive). Returns
/// the actual digest on success.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<String, InstallError> {
    let expected = expected.trim().to_lowercase();
    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(InstallError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(actual)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn open_tar_gz(archive_path: &Path) -> Result<tar::Archive<flate2::read::GzDecoder<File>>, InstallError> {
    let file = File::open(archive_path).map_err(|e| {
        InstallError::io(format!("failed to open archive {}", archive_path.display()), e)
    })?;
    Ok(tar::Archive::new(flate2::read::GzDecoder::new(file)))
}

fn read_error(archive_path: &Path, e: std::io::Error) -> InstallError {
    InstallError::io(format!("failed to read archive {}", archive_path.display()), e)
}

/// Where `entry` would land under `root`, lexically normalized against the
/// absolute form of `root`. `None` when that location is not inside `root`.
pub fn contained_destination(root: &Path, entry: &Path) -> Option<PathBuf> {
    let root = normalize_path(&std::path::absolute(root).ok()?);
    let dest = normalize_path(&root.join(entry));
    dest.starts_with(&root).then_some(dest)
}

/// Where a link entry points, relative to the extraction root. Symlink
/// targets resolve from the link's own directory, hardlink targets from the
/// root. `None` for entries that are not links.
fn link_destination<R: Read>(
    entry: &tar::Entry<'_, R>,
    entry_path: &Path,
) -> std::io::Result<Option<PathBuf>> {
    let kind = entry.header().entry_type();
    if !kind.is_symlink() && !kind.is_hard_link() {
        return Ok(None);
    }
    let Some(link_name) = entry.link_name()? else {
        return Ok(None);
    };
    if kind.is_hard_link() {
        return Ok(Some(link_name.into_owned()));
    }
    let parent = entry_path.parent().unwrap_or(Path::new(""));
    Ok(Some(parent.join(link_name)))
}

/// Extracts a `.tar.gz` archive into `target_dir`.
///
/// All entries are checked first; if any would resolve outside `target_dir`
/// (`..` components, absolute paths, or a symlink or hardlink pointing out of
/// the tree) the whole extraction fails with `PathTraversal` and nothing is
/// written. Returns
/// `target_dir/<archive name without .tar.gz>`.
pub fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<PathBuf, InstallError> {
    let mut archive = open_tar_gz(archive_path)?;
    let mut entry_count = 0usize;
    for entry in archive.entries().map_err(|e| read_error(archive_path, e))? {
        let entry = entry.map_err(|e| read_error(archive_path, e))?;
        let entry_path = entry.path().map_err(|e| read_error(archive_path, e))?;
        let traversal = || InstallError::PathTraversal {
            entry: entry_path.to_path_buf(),
            target: target_dir.to_path_buf(),
        };
        if contained_destination(target_dir, &entry_path).is_none() {
            return Err(traversal());
        }
        let link =
            link_destination(&entry, &entry_path).map_err(|e| read_error(archive_path, e))?;
        if let Some(link) = link {
            if contained_destination(target_dir, &link).is_none() {
                return Err(traversal());
            }
        }
        entry_count += 1;
    }

    std::fs::create_dir_all(target_dir).map_err(|e| {
        InstallError::io(format!("failed to create {}", target_dir.display()), e)
    })?;

    let mut archive = open_tar_gz(archive_path)?;
    archive.set_preserve_permissions(true);
    for entry in archive.entries().map_err(|e| read_error(archive_path, e))? {
        let mut entry = entry.map_err(|e| read_error(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| read_error(archive_path, e))?
            .into_owned();
        let unpacked = entry.unpack_in(target_dir).map_err(|e| {
            InstallError::io(format!("failed to extract {}", entry_path.display()), e)
        })?;
        if !unpacked {
            return Err(InstallError::PathTraversal {
                entry: entry_path,
                target: target_dir.to_path_buf(),
            });
        }
    }
    tracing::debug!(entries = entry_count, target = %target_dir.display(), "archive extracted");

    let archive_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(target_dir.join(extract_dir_name(archive_name)))
}
