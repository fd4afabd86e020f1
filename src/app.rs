use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::ArchiveFetcher;
use crate::config::LauncherConfig;
use crate::domain::{InstallStatus, ReportUsage, Version};
use crate::error::PgapError;
use crate::installer::{InstallOutcome, Installer};
use crate::layout::Layout;
use crate::probe::{self, RuntimeSettings};
use crate::registry::RegistryClient;
use crate::runner::{self, RunRequest};
use crate::runtime::{self, ContainerRuntime};
use crate::version::{effective_version, local_version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(String),
    Download { bytes: u64, total: Option<u64> },
    DownloadFinished,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// What to do with the selected channel's versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionAction {
    #[default]
    Keep,
    List,
    Update,
    Use(Version),
}

#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub show_version: bool,
    pub action: VersionAction,
    pub input: Option<PathBuf>,
    pub test_genome: bool,
    pub output: PathBuf,
    pub debug: bool,
    pub report: ReportUsage,
    pub check_runtime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    ShowedVersion(Option<Version>),
    Listed(Vec<Version>),
    Completed {
        version: Version,
        installed: bool,
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionState {
    pub local: Option<Version>,
    /// Latest first, never empty.
    pub remote: Vec<Version>,
}

impl VersionState {
    pub fn latest(&self) -> &Version {
        &self.remote[0]
    }

    pub fn status(&self) -> InstallStatus {
        InstallStatus::resolve(self.local.as_ref(), self.latest())
    }
}

pub struct App<R: RegistryClient, A: ArchiveFetcher, C: ContainerRuntime> {
    config: LauncherConfig,
    layout: Layout,
    registry: R,
    fetcher: A,
    runtime: C,
}

impl<R: RegistryClient, A: ArchiveFetcher, C: ContainerRuntime> App<R, A, C> {
    pub fn new(
        config: LauncherConfig,
        registry: R,
        fetcher: A,
        runtime: C,
    ) -> Result<Self, PgapError> {
        let layout = Layout::new(&config.root, config.channel)?;
        Ok(Self {
            config,
            layout,
            registry,
            fetcher,
            runtime,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn fetcher(&self) -> &A {
        &self.fetcher
    }

    pub fn runtime(&self) -> &C {
        &self.runtime
    }

    pub fn resolve_versions(&self) -> Result<VersionState, PgapError> {
        let local = local_version(&self.layout)?;
        let repo = self.config.channel.repo();
        let remote = self.registry.remote_versions(&repo)?;
        if remote.is_empty() {
            return Err(PgapError::NoRemoteVersions(repo));
        }
        debug!(local = ?local, latest = %remote[0], "resolved versions");
        Ok(VersionState { local, remote })
    }

    pub fn image(&self, version: &Version) -> String {
        self.config
            .endpoints
            .image(&self.config.channel.repo(), version.as_str())
    }

    /// Resolves the target version and installs it when it differs from the
    /// local one. Returns the target version and whether anything was installed.
    pub fn install_if_stale(
        &self,
        state: &VersionState,
        requested: Option<&Version>,
        force_update: bool,
        sink: &dyn ProgressSink,
    ) -> Result<(Version, bool), PgapError> {
        let target = effective_version(
            requested,
            force_update,
            state.local.as_ref(),
            state.latest(),
        );
        let installer = Installer {
            layout: &self.layout,
            channel: self.config.channel,
            endpoints: &self.config.endpoints,
            fetcher: &self.fetcher,
            runtime: &self.runtime,
        };
        let outcome = installer.install_if_stale(state.local.as_ref(), &target, sink)?;
        Ok((target, matches!(outcome, InstallOutcome::Installed { .. })))
    }

    pub fn check_runtime(&self, version: &Version) -> Result<RuntimeSettings, PgapError> {
        let cwd = std::env::current_dir().map_err(|err| PgapError::Filesystem(err.to_string()))?;
        probe::probe(&self.runtime, &self.image(version), &cwd)
    }

    pub fn run(
        &self,
        version: &Version,
        input_file: &Path,
        request: &LaunchRequest,
    ) -> Result<PathBuf, PgapError> {
        let run_request = RunRequest {
            image: self.image(version),
            data_dir: self
                .layout
                .reference_data_dir(version)
                .into_std_path_buf(),
            input_file: input_file.to_path_buf(),
            output_dir: request.output.clone(),
            debug: request.debug,
            report: request.report,
        };
        runner::run(&self.runtime, &run_request, runtime::current_user().as_deref())
    }

    /// Full launcher flow: status, optional listing, install when stale, then
    /// an optional workflow run. User-facing lines go to `out`.
    pub fn launch(
        &self,
        request: &LaunchRequest,
        out: &mut dyn Write,
        sink: &dyn ProgressSink,
    ) -> Result<LaunchOutcome, PgapError> {
        if request.show_version {
            let local = local_version(&self.layout)?;
            match &local {
                Some(version) => print_line(out, &format!("PGAP version {version}"))?,
                None => print_line(
                    out,
                    "PGAP not installed; use --update to install the latest version.",
                )?,
            }
            return Ok(LaunchOutcome::ShowedVersion(local));
        }

        let state = self.resolve_versions()?;
        print_line(out, &state.status().message())?;

        let (requested, update) = match &request.action {
            VersionAction::List => {
                print_line(out, "Available versions:")?;
                for version in &state.remote {
                    print_line(out, &format!("\t{version}"))?;
                }
                return Ok(LaunchOutcome::Listed(state.remote));
            }
            VersionAction::Keep => (None, false),
            VersionAction::Update => (None, true),
            VersionAction::Use(version) => (Some(version), false),
        };

        let (version, installed) = self.install_if_stale(&state, requested, update, sink)?;

        if request.check_runtime {
            let settings = self.check_runtime(&version)?;
            for warning in probe::check_settings(&settings) {
                print_line(out, &warning.to_string())?;
            }
            if self.config.verbose {
                let rendered = serde_json::to_string(&settings)
                    .map_err(|err| PgapError::Probe(err.to_string()))?;
                print_line(out, &format!("Note: Essential runtime settings = {rendered}"))?;
            }
        }

        let input = if request.test_genome {
            Some(self.layout.test_genome_input().into_std_path_buf())
        } else {
            request.input.clone()
        };
        let output = match input {
            Some(input) => Some(self.run(&version, &input, request)?),
            None => None,
        };

        Ok(LaunchOutcome::Completed {
            version,
            installed,
            output,
        })
    }
}

fn print_line(out: &mut dyn Write, line: &str) -> Result<(), PgapError> {
    writeln!(out, "{line}").map_err(|err| PgapError::Filesystem(err.to_string()))
}
