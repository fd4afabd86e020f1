use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{Channel, Version};
use crate::error::PgapError;

pub const VERSION_FILE: &str = "VERSION";
pub const TEST_GENOMES_DIR: &str = "test_genomes";

/// On-disk layout of one channel's working directory.
#[derive(Debug, Clone)]
pub struct Layout {
    channel_dir: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: &Path, channel: Channel) -> Result<Self, PgapError> {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf())
            .map_err(|path| PgapError::Filesystem(format!("non UTF-8 path {}", path.display())))?;
        let channel_dir = if channel.is_default() {
            root
        } else {
            root.join(channel.name())
        };
        Ok(Self { channel_dir })
    }

    pub fn channel_dir(&self) -> &Utf8Path {
        &self.channel_dir
    }

    pub fn version_marker(&self) -> Utf8PathBuf {
        self.channel_dir.join(VERSION_FILE)
    }

    pub fn reference_data_dir(&self, version: &Version) -> Utf8PathBuf {
        self.channel_dir.join(format!("input-{version}"))
    }

    pub fn test_genomes_dir(&self) -> Utf8PathBuf {
        self.channel_dir.join(TEST_GENOMES_DIR)
    }

    /// Workflow input shipped with the test genome bundle.
    pub fn test_genome_input(&self) -> Utf8PathBuf {
        self.test_genomes_dir().join("MG37").join("input.yaml")
    }

    pub fn ensure_channel_dir(&self) -> Result<(), PgapError> {
        fs::create_dir_all(self.channel_dir.as_std_path())
            .map_err(|err| PgapError::Filesystem(format!("create {}: {err}", self.channel_dir)))
    }

    /// Replaces `path` with `content` through a temp file in the same directory.
    pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PgapError> {
        let parent = path
            .parent()
            .ok_or_else(|| PgapError::Filesystem(format!("invalid destination path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PgapError::Filesystem(err.to_string()))?;
        let temp = Builder::new()
            .prefix(".pgap-marker")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PgapError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| PgapError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PgapError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new(Path::new("/work"), Channel::Dev).unwrap();
        let version: Version = "2024.01.01".parse().unwrap();

        assert_eq!(layout.channel_dir().as_str(), "/work/dev");
        assert!(layout.version_marker().ends_with("dev/VERSION"));
        assert!(layout.reference_data_dir(&version).ends_with("dev/input-2024.01.01"));
        assert!(layout.test_genome_input().ends_with("test_genomes/MG37/input.yaml"));
    }

    #[test]
    fn write_atomic_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("VERSION")).unwrap();
        Layout::write_atomic(&path, b"old\n").unwrap();
        Layout::write_atomic(&path, b"new\n").unwrap();
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "new\n");
    }
}
