use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::archive::ArchiveFetcher;
use crate::config::Endpoints;
use crate::domain::{Channel, Version};
use crate::error::PgapError;
use crate::layout::Layout;
use crate::runtime::ContainerRuntime;
use crate::version::write_version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    Pulled { image: String },
    Downloaded { url: String, path: Utf8PathBuf },
    AlreadyPresent { path: Utf8PathBuf },
    MarkerWritten { version: Version },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Current,
    Installed { steps: Vec<InstallStep> },
}

/// Brings one channel's working directory to a target version: image,
/// reference data, test genomes, then the version marker.
pub struct Installer<'a, A: ArchiveFetcher + ?Sized, C: ContainerRuntime + ?Sized> {
    pub layout: &'a Layout,
    pub channel: Channel,
    pub endpoints: &'a Endpoints,
    pub fetcher: &'a A,
    pub runtime: &'a C,
}

impl<A: ArchiveFetcher + ?Sized, C: ContainerRuntime + ?Sized> Installer<'_, A, C> {
    pub fn install_if_stale(
        &self,
        local: Option<&Version>,
        target: &Version,
        sink: &dyn ProgressSink,
    ) -> Result<InstallOutcome, PgapError> {
        if local == Some(target) {
            debug!(%target, "installed version matches target");
            return Ok(InstallOutcome::Current);
        }
        info!(
            target = %target,
            previous = local.map(|v| v.as_str()).unwrap_or("none"),
            "installing"
        );
        self.layout.ensure_channel_dir()?;

        let mut steps = Vec::new();
        steps.push(self.pull_image(target, sink)?);
        steps.push(self.install_reference_data(target, sink)?);
        steps.push(self.install_test_genomes(sink)?);
        write_version(self.layout, target)?;
        steps.push(InstallStep::MarkerWritten {
            version: target.clone(),
        });
        Ok(InstallOutcome::Installed { steps })
    }

    fn pull_image(
        &self,
        version: &Version,
        sink: &dyn ProgressSink,
    ) -> Result<InstallStep, PgapError> {
        let image = self
            .endpoints
            .image(&self.channel.repo(), version.as_str());
        sink.event(ProgressEvent::Phase(format!(
            "Downloading (as needed) Docker image {image}"
        )));
        self.runtime.pull(&image)?;
        Ok(InstallStep::Pulled { image })
    }

    fn install_reference_data(
        &self,
        version: &Version,
        sink: &dyn ProgressSink,
    ) -> Result<InstallStep, PgapError> {
        let path = self.layout.reference_data_dir(version);
        if path.as_std_path().exists() {
            debug!(%path, "reference data already present");
            return Ok(InstallStep::AlreadyPresent { path });
        }
        sink.event(ProgressEvent::Phase(format!(
            "Downloading PGAP reference data version {version}"
        )));
        let url = self
            .endpoints
            .reference_data_url(version.as_str(), self.channel);
        self.fetcher
            .fetch_and_extract(&url, self.layout.channel_dir().as_std_path(), sink)?;
        Ok(InstallStep::Downloaded { url, path })
    }

    fn install_test_genomes(&self, sink: &dyn ProgressSink) -> Result<InstallStep, PgapError> {
        let path = self.layout.test_genomes_dir();
        if path.as_std_path().exists() {
            debug!(%path, "test genomes already present");
            return Ok(InstallStep::AlreadyPresent { path });
        }
        sink.event(ProgressEvent::Phase(
            "Downloading PGAP test genomes".to_string(),
        ));
        let url = self.endpoints.test_genomes_url.clone();
        self.fetcher
            .fetch_and_extract(&url, self.layout.channel_dir().as_std_path(), sink)?;
        Ok(InstallStep::Downloaded { url, path })
    }
}
