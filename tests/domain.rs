use std::path::Path;

use assert_matches::assert_matches;

use pgap_launcher::domain::{Channel, InstallStatus, ReportUsage, Version};
use pgap_launcher::error::PgapError;
use pgap_launcher::layout::Layout;

#[test]
fn each_channel_has_one_working_directory() {
    let cases = [
        (Channel::Default, ".", "pgap"),
        (Channel::Dev, "./dev", "pgap-dev"),
        (Channel::Test, "./test", "pgap-test"),
        (Channel::Prod, "./prod", "pgap-prod"),
    ];
    for (channel, dir, repo) in cases {
        assert_eq!(channel.dir(), dir);
        assert_eq!(channel.repo(), repo);
        let layout = Layout::new(Path::new("."), channel).unwrap();
        assert_eq!(layout.channel_dir().as_str(), dir);
    }
}

#[test]
fn install_status_messages() {
    let v1: Version = "v1".parse().unwrap();
    let v2: Version = "v2".parse().unwrap();

    assert_eq!(
        InstallStatus::resolve(None, &v2).message(),
        "The latest version of PGAP is v2, you have nothing installed locally."
    );
    assert_eq!(
        InstallStatus::resolve(Some(&v2), &v2).message(),
        "PGAP v2 is up to date."
    );
    assert_eq!(
        InstallStatus::resolve(Some(&v1), &v2).message(),
        "The latest version of PGAP is v2, you are using version v1, please update."
    );
}

#[test]
fn report_usage_flags() {
    assert_eq!(ReportUsage::from_flags(false, false).unwrap(), ReportUsage::Unset);
    assert_eq!(ReportUsage::True.manifest_value(), Some("true"));
    assert_eq!(ReportUsage::False.manifest_value(), Some("false"));
    assert_eq!(ReportUsage::Unset.manifest_value(), None);
    assert_matches!(ReportUsage::from_flags(true, true), Err(PgapError::Config(_)));
}

#[test]
fn invalid_version_is_config_error() {
    assert_matches!("  ".parse::<Version>(), Err(PgapError::Config(_)));
}
