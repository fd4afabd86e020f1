use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use pgap_launcher::app::{App, LaunchRequest, VersionAction};
use pgap_launcher::archive::HttpArchiveFetcher;
use pgap_launcher::config::{DEFAULT_RUNTIME, LauncherConfig};
use pgap_launcher::domain::{Channel, ReportUsage};
use pgap_launcher::error::PgapError;
use pgap_launcher::output::ConsoleOutput;
use pgap_launcher::registry::HttpRegistryClient;
use pgap_launcher::runtime::DockerRuntime;

#[derive(Parser)]
#[command(name = "pgap")]
#[command(about = "Run PGAP.")]
#[command(group(ArgGroup::new("channel").args(["dev", "test", "prod"])))]
#[command(group(ArgGroup::new("action").args(["list", "update", "use_version"])))]
#[command(group(ArgGroup::new("report").args(["report_usage_true", "report_usage_false"])))]
struct Cli {
    #[arg(help = "Input YAML file to process.")]
    input: Option<PathBuf>,

    #[arg(short = 'V', long, help = "Print currently set up PGAP version")]
    version: bool,

    #[arg(short, long, help = "Verbose mode")]
    verbose: bool,

    #[arg(long, help = "Set development mode")]
    dev: bool,

    #[arg(long, help = "Set test mode")]
    test: bool,

    #[arg(long, help = "Set production mode")]
    prod: bool,

    #[arg(short, long, help = "List available versions.")]
    list: bool,

    #[arg(
        short,
        long,
        help = "Update to the latest PGAP version, including reference data."
    )]
    update: bool,

    #[arg(long, hide = true)]
    use_version: Option<String>,

    #[arg(
        short = 'r',
        long,
        help = "Set the report_usage flag in the YAML to true."
    )]
    report_usage_true: bool,

    #[arg(
        short = 'n',
        long,
        help = "Set the report_usage flag in the YAML to false."
    )]
    report_usage_false: bool,

    #[arg(
        short,
        long,
        value_name = "path",
        env = "PGAP_DOCKER",
        default_value = DEFAULT_RUNTIME,
        help = "Docker executable, which may include a full path like /usr/bin/docker"
    )]
    docker: PathBuf,

    #[arg(
        short,
        long,
        value_name = "path",
        default_value = "output",
        help = "Output directory to be created, which may include a full path"
    )]
    output: PathBuf,

    #[arg(short, long, help = "Run a test genome")]
    test_genome: bool,

    #[arg(short = 'D', long, help = "Debug mode")]
    debug: bool,

    #[arg(long, hide = true)]
    check_runtime: bool,
}

impl Cli {
    fn channel(&self) -> Channel {
        if self.dev {
            Channel::Dev
        } else if self.test {
            Channel::Test
        } else if self.prod {
            Channel::Prod
        } else {
            Channel::Default
        }
    }

    fn action(&self) -> Result<VersionAction, PgapError> {
        if let Some(version) = &self.use_version {
            return Ok(VersionAction::Use(version.parse()?));
        }
        if self.list {
            return Ok(VersionAction::List);
        }
        if self.update {
            return Ok(VersionAction::Update);
        }
        Ok(VersionAction::Keep)
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PgapError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PgapError) -> u8 {
    match error {
        PgapError::Config(_) | PgapError::NoRemoteVersions(_) => 2,
        PgapError::Network(_)
        | PgapError::RegistryStatus { .. }
        | PgapError::ArchiveStatus { .. } => 3,
        PgapError::PipelineExecution { .. } | PgapError::MissingTool(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = LauncherConfig::new(cli.channel())
        .with_docker(cli.docker.clone())
        .with_verbose(cli.verbose);
    let request = LaunchRequest {
        show_version: cli.version,
        action: cli.action()?,
        input: cli.input.clone(),
        test_genome: cli.test_genome,
        output: cli.output.clone(),
        debug: cli.debug,
        report: ReportUsage::from_flags(cli.report_usage_true, cli.report_usage_false)?,
        check_runtime: cli.check_runtime,
    };

    let registry = HttpRegistryClient::new(config.endpoints.registry_base.clone())?;
    let fetcher = HttpArchiveFetcher::new()?;
    let runtime = DockerRuntime::new(config.docker.clone());
    let app = App::new(config, registry, fetcher, runtime)?;

    let mut stdout = io::stdout();
    app.launch(&request, &mut stdout, &ConsoleOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pgap").chain(args.iter().copied()))
    }

    #[test]
    fn flag_groups_are_mutually_exclusive() {
        for args in [
            &["--dev", "--prod"][..],
            &["--test", "--dev"][..],
            &["--list", "--update"][..],
            &["-u", "--use-version", "2024.01.01"][..],
            &["-r", "-n"][..],
        ] {
            let err = parse(args).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "{args:?}");
        }
    }

    #[test]
    fn short_v_prints_installed_version() {
        let cli = parse(&["--dev", "-V"]).unwrap();
        assert!(cli.version);
        assert_eq!(cli.channel(), Channel::Dev);
    }

    #[test]
    fn action_and_report_selection() {
        let cli = parse(&["--use-version", "2024.01.01", "-n", "-t"]).unwrap();
        assert_eq!(
            cli.action().unwrap(),
            VersionAction::Use("2024.01.01".parse().unwrap())
        );
        assert_eq!(
            ReportUsage::from_flags(cli.report_usage_true, cli.report_usage_false).unwrap(),
            ReportUsage::False
        );
        assert!(cli.test_genome);
        assert_eq!(cli.output, PathBuf::from("output"));

        let cli = parse(&["-l"]).unwrap();
        assert_eq!(cli.action().unwrap(), VersionAction::List);
        assert_eq!(cli.channel(), Channel::Default);
    }

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(map_exit_code(&PgapError::Config("x".to_string())), 2);
        assert_eq!(
            map_exit_code(&PgapError::NoRemoteVersions("pgap".to_string())),
            2
        );
        assert_eq!(map_exit_code(&PgapError::Network("x".to_string())), 3);
        assert_eq!(
            map_exit_code(&PgapError::ArchiveStatus {
                status: 404,
                url: "u".to_string(),
            }),
            3
        );
        assert_eq!(
            map_exit_code(&PgapError::PipelineExecution {
                command: "docker run".to_string(),
                status: "exit status: 1".to_string(),
            }),
            4
        );
        assert_eq!(map_exit_code(&PgapError::Archive("x".to_string())), 1);
    }
}
