use std::fs;
use std::io;

use tracing::warn;

use crate::domain::Version;
use crate::error::PgapError;
use crate::layout::Layout;

/// Version recorded in the channel's marker file, `None` when nothing is installed.
pub fn local_version(layout: &Layout) -> Result<Option<Version>, PgapError> {
    let path = layout.version_marker();
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(PgapError::MarkerRead {
                path: path.into_std_path_buf(),
                message: err.to_string(),
            });
        }
    };
    if content.trim().is_empty() {
        warn!(%path, "ignoring empty version marker");
        return Ok(None);
    }
    content
        .parse()
        .map(Some)
        .map_err(|_| PgapError::MarkerRead {
            path: path.into_std_path_buf(),
            message: format!("malformed version {:?}", content.trim()),
        })
}

pub fn write_version(layout: &Layout, version: &Version) -> Result<(), PgapError> {
    Layout::write_atomic(&layout.version_marker(), format!("{version}\n").as_bytes())
}

/// Picks the version to install or run: an explicit request wins, then the
/// latest release when updating or when nothing is installed, then whatever
/// is installed.
pub fn effective_version(
    requested: Option<&Version>,
    update: bool,
    local: Option<&Version>,
    latest: &Version,
) -> Version {
    if let Some(requested) = requested {
        return requested.clone();
    }
    match local {
        Some(local) if !update => local.clone(),
        _ => latest.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::domain::Channel;

    fn v(value: &str) -> Version {
        value.parse().unwrap()
    }

    #[test]
    fn explicit_request_wins() {
        let chosen = effective_version(Some(&v("x")), true, Some(&v("a")), &v("b"));
        assert_eq!(chosen, v("x"));
        let chosen = effective_version(Some(&v("x")), false, None, &v("b"));
        assert_eq!(chosen, v("x"));
    }

    #[test]
    fn update_or_missing_uses_latest() {
        assert_eq!(effective_version(None, true, Some(&v("a")), &v("b")), v("b"));
        assert_eq!(effective_version(None, false, None, &v("b")), v("b"));
        assert_eq!(effective_version(None, false, Some(&v("a")), &v("b")), v("a"));
    }

    #[test]
    fn marker_roundtrip_and_absence() {
        let temp = tempfile::tempdir().unwrap();
        let layout = Layout::new(temp.path(), Channel::Default).unwrap();
        assert_eq!(local_version(&layout).unwrap(), None);

        fs::write(temp.path().join("VERSION"), "2023-10-03.build123\n").unwrap();
        assert_eq!(
            local_version(&layout).unwrap(),
            Some(v("2023-10-03.build123"))
        );

        write_version(&layout, &v("2024.01.01")).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("VERSION")).unwrap(),
            "2024.01.01\n"
        );
    }

    #[test]
    fn unreadable_marker_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("VERSION")).unwrap();
        let layout = Layout::new(Path::new(temp.path()), Channel::Default).unwrap();
        assert!(matches!(
            local_version(&layout),
            Err(PgapError::MarkerRead { .. })
        ));
    }

    #[test]
    fn empty_marker_means_uninstalled() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("VERSION"), " \n").unwrap();
        let layout = Layout::new(temp.path(), Channel::Default).unwrap();
        assert_eq!(local_version(&layout).unwrap(), None);
    }

    #[test]
    fn malformed_marker_is_reported_not_reinstalled() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("VERSION"), "2024 build\n").unwrap();
        let layout = Layout::new(temp.path(), Channel::Default).unwrap();
        match local_version(&layout) {
            Err(PgapError::MarkerRead { path, message }) => {
                assert!(path.ends_with("VERSION"));
                assert!(message.contains("2024 build"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn marker_read_error_keeps_cause() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("VERSION"), [0xff, 0xfe, b'\n']).unwrap();
        let layout = Layout::new(temp.path(), Channel::Default).unwrap();
        match local_version(&layout) {
            Err(PgapError::MarkerRead { message, .. }) => {
                assert!(message.contains("UTF-8"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
