use std::path::PathBuf;

use crate::domain::Channel;

pub const DEFAULT_RUNTIME: &str = "docker";

/// Settings resolved once from the command line and passed down explicitly.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Container runtime executable, e.g. `docker` or `/usr/bin/podman`.
    pub docker: PathBuf,
    pub verbose: bool,
    /// Directory the channel working directories are resolved against.
    pub root: PathBuf,
    pub channel: Channel,
    pub endpoints: Endpoints,
}

impl LauncherConfig {
    pub fn new(channel: Channel) -> Self {
        Self {
            docker: PathBuf::from(DEFAULT_RUNTIME),
            verbose: false,
            root: PathBuf::from("."),
            channel,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_docker(mut self, docker: impl Into<PathBuf>) -> Self {
        self.docker = docker.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// Remote locations the launcher talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Tag listing base; `<base>/<repo>/tags` is queried.
    pub registry_base: String,
    /// Object storage prefix holding `input-<version>.[<channel>.]tgz`.
    pub data_base: String,
    pub test_genomes_url: String,
    /// Image namespace, combined as `<namespace>/<repo>:<version>`.
    pub image_namespace: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            registry_base: "https://registry.hub.docker.com/v1/repositories/ncbi".to_string(),
            data_base: "https://s3.amazonaws.com/pgap".to_string(),
            test_genomes_url: "https://s3.amazonaws.com/pgap-data/test_genomes.tgz".to_string(),
            image_namespace: "ncbi".to_string(),
        }
    }
}

impl Endpoints {
    pub fn reference_data_url(&self, version: &str, channel: Channel) -> String {
        let suffix = if channel.is_default() {
            String::new()
        } else {
            format!("{}.", channel.name())
        };
        format!(
            "{}/input-{version}.{suffix}tgz",
            self.data_base.trim_end_matches('/')
        )
    }

    pub fn image(&self, repo: &str, version: &str) -> String {
        format!("{}/{repo}:{version}", self.image_namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_urls() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.reference_data_url("2024.01.01", Channel::Default),
            "https://s3.amazonaws.com/pgap/input-2024.01.01.tgz"
        );
        assert_eq!(
            endpoints.reference_data_url("2024.01.01", Channel::Test),
            "https://s3.amazonaws.com/pgap/input-2024.01.01.test.tgz"
        );
        assert_eq!(endpoints.image("pgap", "2024.01.01"), "ncbi/pgap:2024.01.01");
    }
}
