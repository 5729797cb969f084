use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use boost_installer::config::InstallerConfig;
use boost_installer::error::InstallError;
use boost_installer::fetch::HttpFetcher;
use boost_installer::installer::Installer;
use boost_installer::output::{self, ConsoleReporter};
use boost_installer::plan::InstallRequest;
use boost_installer::platform::{self, SystemRunner};

/// Install Boost from source code.
///
/// Downloads the release archive, extracts it, runs bootstrap and
/// `b2 install`. Point CMake at the result with -DBOOST_ROOT=<path>.
#[derive(Parser, Debug)]
#[command(
    name = "install-boost",
    about,
    disable_version_flag = true,
    after_help = "Examples:\n  install-boost -v 1.75\n  install-boost -v 1.84 -t clang -p /opt/boost_1.84.0\n  install-boost -v 1.75 --download-only"
)]
struct Cli {
    /// Boost version to be installed, e.g. 1.75.
    #[arg(short = 'v', long = "version", value_name = "VERSION")]
    version: String,

    /// Compiler toolset passed to bootstrap and b2 [default: gcc | msvc].
    #[arg(short, long)]
    toolset: Option<String>,

    /// Installation path [default: ~/.local/boost_<ver> | C:\boost\boost_<ver>].
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Keep the downloaded archive and extracted sources after installing.
    #[arg(long)]
    keep_download: bool,

    /// Download and extract the archive without installing.
    #[arg(long)]
    download_only: bool,

    /// Expected SHA-256 of the release archive.
    #[arg(long, value_name = "HEX")]
    sha256: Option<String>,

    /// Base URL of the release archive (overrides config and env).
    #[arg(long, value_name = "URL")]
    mirror_url: Option<String>,

    /// Print debug diagnostics.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> InstallRequest {
        InstallRequest {
            version: self.version.clone(),
            toolset: self.toolset.clone(),
            path: self.path.clone(),
            keep_download: self.keep_download,
            download_only: self.download_only,
            sha256: self.sha256.clone(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = InstallerConfig::load().context(
        "Failed to load config. Check ~/.boost-installer/config.toml for syntax errors.",
    )?;
    let settings = config.resolve(cli.mirror_url.as_deref());
    tracing::debug!(?settings, host_target = platform::build_target(), "resolved settings");

    let fetcher = HttpFetcher::new();
    let reporter = ConsoleReporter::new();
    let installer = Installer::new(platform::host(), &fetcher, &SystemRunner, &reporter);

    installer.run(&cli.request(), &settings)?;
    Ok(())
}

/// Maps a failed run to its process exit code. Errors that are not an
/// [`InstallError`] are unexpected and exit with 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<InstallError>()
        .map(InstallError::exit_code)
        .unwrap_or(1)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        output::error(&format!("{e:#}"));
        process::exit(exit_code(&e));
    }
}
