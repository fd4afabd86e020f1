use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PgapError {
    #[error("network request failed: {0}")]
    Network(String),

    #[error("registry returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("download of {url} returned status {status}")]
    ArchiveStatus { status: u16, url: String },

    #[error("failed to parse registry response: {0}")]
    Parse(String),

    #[error("invalid archive stream: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("output directory already exists: {0}")]
    #[diagnostic(help("choose a new path with --output or remove the existing directory"))]
    OutputExists(PathBuf),

    #[error("failed to read version marker at {}: {message}", .path.display())]
    MarkerRead { path: PathBuf, message: String },

    #[error("command `{command}` failed with {status}")]
    PipelineExecution { command: String, status: String },

    #[error("failed to launch container runtime {0}")]
    #[diagnostic(help("pass the runtime executable with --docker, e.g. --docker /usr/bin/docker"))]
    MissingTool(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("registry lists no versions for repository {0}")]
    NoRemoteVersions(String),

    #[error("unexpected runtime probe output: {0}")]
    Probe(String),
}
