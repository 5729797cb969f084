//! The install pipeline.
//!
//! A run moves through
//! `Start → PlanResolved → Downloaded → Extracted → PrefixResolved →
//! ToolsetResolved → Bootstrapped → Built → CleanedUp → Done`, stopping after
//! `Extracted` for `--download-only` and skipping `CleanedUp` for
//! `--keep-download` or when something could not be removed. Any error before `Built` aborts the run; partial
//! installs are left in place. Cleanup failures only produce a warning.

use std::path::{Path, PathBuf};

use crate::config::{self, Settings};
use crate::error::InstallError;
use crate::fetch::{self, Fetcher};
use crate::output::{Event, Reporter};
use crate::plan::{self, InstallRequest, InstallTarget, ResolvedPlan};
use crate::platform::{CommandRunner, CommandSpec, PlatformOps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    PlanResolved,
    Downloaded,
    Extracted,
    PrefixResolved,
    ToolsetResolved,
    Bootstrapped,
    Built,
    CleanedUp,
    Done,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub plan: ResolvedPlan,
    pub extract_dir: PathBuf,
    /// `None` for download-only runs.
    pub target: Option<InstallTarget>,
    /// True when the archive and extraction directory were both removed.
    pub cleaned_up: bool,
}

pub struct Installer<'a> {
    platform: &'a dyn PlatformOps,
    fetcher: &'a dyn Fetcher,
    runner: &'a dyn CommandRunner,
    reporter: &'a dyn Reporter,
    home: Option<PathBuf>,
}

impl<'a> Installer<'a> {
    pub fn new(
        platform: &'a dyn PlatformOps,
        fetcher: &'a dyn Fetcher,
        runner: &'a dyn CommandRunner,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            platform,
            fetcher,
            runner,
            reporter,
            home: config::home_dir(),
        }
    }

    /// Overrides the home directory used for the default install prefix.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    fn stage(&self, stage: Stage) {
        self.reporter.report(Event::Stage(stage));
    }

    /// Runs the whole pipeline for `request`.
    pub fn run(
        &self,
        request: &InstallRequest,
        settings: &Settings,
    ) -> Result<RunOutcome, InstallError> {
        self.stage(Stage::Start);

        let plan = self.resolve_plan(request, settings)?;
        self.stage(Stage::PlanResolved);

        self.download(&plan.url, &plan.archive_path)?;
        if let Some(expected) = request.sha256.as_deref() {
            let digest = fetch::verify_sha256(&plan.archive_path, expected)?;
            self.reporter.report(Event::ChecksumVerified { digest });
        }
        self.stage(Stage::Downloaded);

        let extract_dir = self.extract(&plan.archive_path, &plan.temp_dir)?;
        self.stage(Stage::Extracted);

        if request.download_only {
            self.reporter.report(Event::Skipped {
                step: "bootstrap, build and cleanup",
                reason: "--download-only",
            });
            self.stage(Stage::Done);
            return Ok(RunOutcome {
                plan,
                extract_dir,
                target: None,
                cleaned_up: false,
            });
        }

        let prefix = self.resolve_install_prefix(request.path.as_deref(), &plan.version)?;
        self.stage(Stage::PrefixResolved);

        let toolset = self.resolve_toolset(request.toolset.as_deref());
        self.stage(Stage::ToolsetResolved);

        let target = InstallTarget {
            prefix_arg: plan::prefix_arg(&prefix),
            prefix,
            toolset,
        };

        self.run_bootstrap(&target.prefix_arg, &target.toolset, &extract_dir)?;
        self.stage(Stage::Bootstrapped);

        self.run_build(&target.prefix_arg, &target.toolset, &extract_dir)?;
        self.stage(Stage::Built);

        let cleaned_up = if request.keep_download {
            self.reporter.report(Event::Skipped {
                step: "cleanup",
                reason: "--keep-download",
            });
            false
        } else {
            let removed = self.cleanup(&plan.archive_path, &extract_dir);
            if removed {
                self.stage(Stage::CleanedUp);
            }
            removed
        };

        self.stage(Stage::Done);
        Ok(RunOutcome {
            plan,
            extract_dir,
            target: Some(target),
            cleaned_up,
        })
    }

    pub fn resolve_plan(
        &self,
        request: &InstallRequest,
        settings: &Settings,
    ) -> Result<ResolvedPlan, InstallError> {
        let plan = ResolvedPlan::resolve(request, settings)?;
        self.reporter.report(Event::TempDir(plan.temp_dir.clone()));
        Ok(plan)
    }

    pub fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError> {
        self.reporter.report(Event::Downloading {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });
        let bytes = self.fetcher.download(url, dest)?;
        self.reporter.report(Event::Downloaded {
            path: dest.to_path_buf(),
            bytes,
        });
        Ok(bytes)
    }

    pub fn extract(&self, archive: &Path, target_dir: &Path) -> Result<PathBuf, InstallError> {
        let name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.reporter.report(Event::Extracting {
            dir: target_dir.join(plan::extract_dir_name(name)),
        });
        self.fetcher.extract(archive, target_dir)
    }

    pub fn resolve_install_prefix(
        &self,
        user_path: Option<&Path>,
        version: &str,
    ) -> Result<PathBuf, InstallError> {
        let prefix =
            plan::resolve_install_prefix(user_path, version, self.platform, self.home.as_deref())?;
        self.reporter.report(Event::InstallPath(prefix.clone()));
        Ok(prefix)
    }

    pub fn resolve_toolset(&self, user_toolset: Option<&str>) -> String {
        let toolset = plan::resolve_toolset(user_toolset, self.platform);
        self.reporter.report(Event::Toolset(toolset.clone()));
        toolset
    }

    /// Runs `bootstrap.sh`/`bootstrap.bat` in the source tree. A non-zero
    /// exit is fatal.
    pub fn run_bootstrap(
        &self,
        prefix_arg: &str,
        toolset: &str,
        work_dir: &Path,
    ) -> Result<(), InstallError> {
        let spec = self.platform.bootstrap_command(toolset, prefix_arg);
        self.reporter.report(Event::BootstrapCommand(spec.to_string()));
        self.run_tool("bootstrap", &spec, work_dir)
    }

    /// Runs `b2 install` in the source tree. A non-zero exit is fatal.
    pub fn run_build(
        &self,
        prefix_arg: &str,
        toolset: &str,
        work_dir: &Path,
    ) -> Result<(), InstallError> {
        let spec = self.platform.build_command(toolset, prefix_arg);
        self.reporter.report(Event::BuildCommand(spec.to_string()));
        self.run_tool("build", &spec, work_dir)
    }

    fn run_tool(
        &self,
        step: &'static str,
        spec: &CommandSpec,
        cwd: &Path,
    ) -> Result<(), InstallError> {
        let exit = self
            .runner
            .run(spec, cwd)
            .map_err(|source| InstallError::ToolSpawn {
                step,
                command: spec.to_string(),
                source,
            })?;
        if !exit.success() {
            return Err(InstallError::ExternalTool {
                step,
                command: spec.to_string(),
                code: exit.code,
            });
        }
        Ok(())
    }

    /// Removes the archive and the extraction directory if they exist.
    ///
    /// Failures are reported as `CleanupFailed` events and never abort the
    /// run. Returns true when nothing was left behind.
    pub fn cleanup(&self, archive: &Path, extract_dir: &Path) -> bool {
        let mut clean = true;
        for result in [
            self.remove_archive(archive),
            self.remove_extract_dir(extract_dir),
        ] {
            if let Err(err) = result {
                tracing::debug!(error = %err, "cleanup failed");
                clean = false;
                if let InstallError::Cleanup { path, reason } = err {
                    self.reporter.report(Event::CleanupFailed { path, reason });
                }
            }
        }
        clean
    }

    fn remove_archive(&self, archive: &Path) -> Result<(), InstallError> {
        if !archive.exists() {
            return Ok(());
        }
        std::fs::remove_file(archive).map_err(|e| InstallError::Cleanup {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.reporter.report(Event::Removed(archive.to_path_buf()));
        Ok(())
    }

    fn remove_extract_dir(&self, dir: &Path) -> Result<(), InstallError> {
        if !dir.exists() {
            return Ok(());
        }
        let cleanup_error = |reason: String| InstallError::Cleanup {
            path: dir.to_path_buf(),
            reason,
        };

        match self.platform.remove_dir_command(dir) {
            Some(spec) => {
                self.reporter.report(Event::RemoveCommand(spec.to_string()));
                let cwd = dir.parent().unwrap_or(Path::new("."));
                let exit = self
                    .runner
                    .run(&spec, cwd)
                    .map_err(|e| cleanup_error(e.to_string()))?;
                if !exit.success() {
                    return Err(cleanup_error(format!("`{spec}` exited with {:?}", exit.code)));
                }
            }
            None => {
                std::fs::remove_dir_all(dir).map_err(|e| cleanup_error(e.to_string()))?;
            }
        }

        if dir.exists() {
            return Err(cleanup_error("directory still exists".to_string()));
        }
        self.reporter.report(Event::Removed(dir.to_path_buf()));
        Ok(())
    }
}
