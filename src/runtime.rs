use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::error::PgapError;

/// Container runtime with a docker-compatible command line.
pub trait ContainerRuntime: Send + Sync {
    fn pull(&self, image: &str) -> Result<(), PgapError>;

    /// Runs `<runtime> <args...>` with inherited stdio and waits for it.
    fn run(&self, args: &[String]) -> Result<(), PgapError>;

    /// Runs `<runtime> <args...>` and returns its stdout.
    fn capture(&self, args: &[String]) -> Result<String, PgapError>;
}

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: PathBuf,
}

impl DockerRuntime {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        debug!(command = %render_command(&self.program, args), "spawning container runtime");
        cmd
    }

    fn spawn_error(&self, err: io::Error) -> PgapError {
        if err.kind() == io::ErrorKind::NotFound {
            PgapError::MissingTool(self.program.display().to_string())
        } else {
            PgapError::PipelineExecution {
                command: self.program.display().to_string(),
                status: err.to_string(),
            }
        }
    }

    fn check_status(&self, args: &[String], status: ExitStatus) -> Result<(), PgapError> {
        if status.success() {
            return Ok(());
        }
        Err(PgapError::PipelineExecution {
            command: render_command(&self.program, args),
            status: status.to_string(),
        })
    }
}

impl ContainerRuntime for DockerRuntime {
    fn pull(&self, image: &str) -> Result<(), PgapError> {
        info!(image, "pulling container image");
        self.run(&["pull".to_string(), image.to_string()])
    }

    fn run(&self, args: &[String]) -> Result<(), PgapError> {
        let status = self
            .command(args)
            .status()
            .map_err(|err| self.spawn_error(err))?;
        self.check_status(args, status)
    }

    fn capture(&self, args: &[String]) -> Result<String, PgapError> {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|err| self.spawn_error(err))?;
        self.check_status(args, output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// `uid:gid` of the invoking user, for `--user`. `None` where the platform
/// has no POSIX ids.
#[cfg(unix)]
pub fn current_user() -> Option<String> {
    let uid = id_value("-u")?;
    let gid = id_value("-g")?;
    Some(format!("{uid}:{gid}"))
}

#[cfg(not(unix))]
pub fn current_user() -> Option<String> {
    None
}

#[cfg(unix)]
fn id_value(flag: &str) -> Option<String> {
    let output = Command::new("id").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        None
    } else {
        Some(value)
    }
}
