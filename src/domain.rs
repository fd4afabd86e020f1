use std::fmt;
use std::str::FromStr;

use crate::error::PgapError;

/// Release track of the pipeline. Each channel has its own registry
/// repository and its own working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Default,
    Dev,
    Test,
    Prod,
}

impl Channel {
    /// Channel name, empty for the default channel.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Default => "",
            Channel::Dev => "dev",
            Channel::Test => "test",
            Channel::Prod => "prod",
        }
    }

    pub fn is_default(self) -> bool {
        matches!(self, Channel::Default)
    }

    /// Registry repository name: `pgap` or `pgap-<channel>`.
    pub fn repo(self) -> String {
        if self.is_default() {
            "pgap".to_string()
        } else {
            format!("pgap-{}", self.name())
        }
    }

    /// Working directory relative to the launcher root: `.` or `./<channel>`.
    pub fn dir(self) -> String {
        if self.is_default() {
            ".".to_string()
        } else {
            format!("./{}", self.name())
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Default => write!(f, "default"),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = PgapError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(|ch| ch.is_whitespace()) {
            return Err(PgapError::Config(format!("invalid version: {value:?}")));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Value injected into the run manifest as `report_usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportUsage {
    #[default]
    Unset,
    True,
    False,
}

impl ReportUsage {
    pub fn from_flags(report_true: bool, report_false: bool) -> Result<Self, PgapError> {
        match (report_true, report_false) {
            (true, true) => Err(PgapError::Config(
                "--report-usage-true and --report-usage-false are mutually exclusive".to_string(),
            )),
            (true, false) => Ok(ReportUsage::True),
            (false, true) => Ok(ReportUsage::False),
            (false, false) => Ok(ReportUsage::Unset),
        }
    }

    pub fn manifest_value(self) -> Option<&'static str> {
        match self {
            ReportUsage::Unset => None,
            ReportUsage::True => Some("true"),
            ReportUsage::False => Some("false"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Uninstalled { latest: Version },
    UpToDate { local: Version },
    Stale { local: Version, latest: Version },
}

impl InstallStatus {
    pub fn resolve(local: Option<&Version>, latest: &Version) -> Self {
        match local {
            None => InstallStatus::Uninstalled {
                latest: latest.clone(),
            },
            Some(local) if local == latest => InstallStatus::UpToDate {
                local: local.clone(),
            },
            Some(local) => InstallStatus::Stale {
                local: local.clone(),
                latest: latest.clone(),
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            InstallStatus::Uninstalled { latest } => format!(
                "The latest version of PGAP is {latest}, you have nothing installed locally."
            ),
            InstallStatus::UpToDate { local } => format!("PGAP {local} is up to date."),
            InstallStatus::Stale { local, latest } => format!(
                "The latest version of PGAP is {latest}, you are using version {local}, please update."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_repo_and_dir() {
        assert_eq!(Channel::Default.repo(), "pgap");
        assert_eq!(Channel::Default.dir(), ".");
        assert_eq!(Channel::Dev.repo(), "pgap-dev");
        assert_eq!(Channel::Prod.dir(), "./prod");
    }

    #[test]
    fn version_is_trimmed() {
        let version: Version = " 2023-10-03.build123\n".parse().unwrap();
        assert_eq!(version.as_str(), "2023-10-03.build123");
        assert!("".parse::<Version>().is_err());
        assert!("a b".parse::<Version>().is_err());
    }
}
