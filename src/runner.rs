use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::ReportUsage;
use crate::error::PgapError;
use crate::runtime::ContainerRuntime;

pub const MANIFEST_NAME: &str = "pgap_input.yaml";
pub const LOG_DIR: &str = "log";

const CONTAINER_DATA: &str = "/pgap/input";
const CONTAINER_USER_INPUT: &str = "/pgap/user_input";
const CONTAINER_MANIFEST: &str = "/pgap/user_input/pgap_input.yaml";
const CONTAINER_OUTPUT: &str = "/pgap/output";
const CONTAINER_LOG: &str = "/log/srv";

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image: String,
    pub data_dir: PathBuf,
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub debug: bool,
    pub report: ReportUsage,
}

/// Absolute host paths resolved for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub data_dir: PathBuf,
    pub input_dir: PathBuf,
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl RunPaths {
    pub fn resolve(request: &RunRequest) -> Result<Self, PgapError> {
        let data_dir = absolute(&request.data_dir)?;
        let input_file = absolute(&request.input_file)?;
        let input_dir = input_file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                PgapError::Filesystem(format!("input file {} has no parent", input_file.display()))
            })?;
        let output_dir = absolute(&request.output_dir)?;
        Ok(Self {
            data_dir,
            input_dir,
            manifest: output_dir.join(MANIFEST_NAME),
            log_dir: output_dir.join(LOG_DIR),
            output_dir,
        })
    }
}

/// Creates the output directory and its log subdirectory. An existing
/// output directory is never reused.
pub fn prepare_output(output_dir: &Path) -> Result<(), PgapError> {
    fs::create_dir(output_dir).map_err(|err| match err.kind() {
        io::ErrorKind::AlreadyExists => PgapError::OutputExists(output_dir.to_path_buf()),
        _ => PgapError::Filesystem(format!("create {}: {err}", output_dir.display())),
    })?;
    let log_dir = output_dir.join(LOG_DIR);
    fs::create_dir(&log_dir)
        .map_err(|err| PgapError::Filesystem(format!("create {}: {err}", log_dir.display())))
}

/// Writes the user's input followed by the injected `supplemental_data` and
/// optional `report_usage` keys.
pub fn write_manifest(
    input_file: &Path,
    manifest: &Path,
    report: ReportUsage,
) -> Result<(), PgapError> {
    let mut source = File::open(input_file)
        .map_err(|err| PgapError::Filesystem(format!("open {}: {err}", input_file.display())))?;
    let mut out = File::create(manifest)
        .map_err(|err| PgapError::Filesystem(format!("create {}: {err}", manifest.display())))?;
    let write_err = |err: io::Error| PgapError::Filesystem(format!("write manifest: {err}"));

    io::copy(&mut source, &mut out).map_err(write_err)?;
    out.write_all(b"\n").map_err(write_err)?;
    writeln!(
        out,
        "supplemental_data: {{ class: Directory, location: {CONTAINER_DATA} }}"
    )
    .map_err(write_err)?;
    if let Some(value) = report.manifest_value() {
        writeln!(out, "report_usage: {value}").map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Arguments to the container runtime for the workflow run.
pub fn build_run_args(
    image: &str,
    paths: &RunPaths,
    user: Option<&str>,
    debug: bool,
) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-i".to_string()];
    if let Some(user) = user {
        args.push("--user".to_string());
        args.push(user.to_string());
    }
    let volumes = [
        format!("{}:{CONTAINER_DATA}:ro", paths.data_dir.display()),
        format!("{}:{CONTAINER_USER_INPUT}", paths.input_dir.display()),
        format!("{}:{CONTAINER_MANIFEST}:ro", paths.manifest.display()),
        format!("{}:{CONTAINER_OUTPUT}:rw", paths.output_dir.display()),
        format!("{}:{CONTAINER_LOG}", paths.log_dir.display()),
    ];
    for volume in volumes {
        args.push("--volume".to_string());
        args.push(volume);
    }
    args.extend([
        image.to_string(),
        "cwltool".to_string(),
        "--outdir".to_string(),
        CONTAINER_OUTPUT.to_string(),
    ]);
    if debug {
        args.extend(
            [
                "--tmpdir-prefix",
                "/pgap/output/tmpdir/",
                "--leave-tmpdir",
                "--tmp-outdir-prefix",
                "/pgap/output/tmp-outdir/",
                "--copy-outputs",
            ]
            .map(String::from),
        );
    }
    args.push("pgap.cwl".to_string());
    args.push(CONTAINER_MANIFEST.to_string());
    args
}

/// Prepares the output directory and manifest, then runs the workflow to
/// completion. Returns the absolute output directory.
pub fn run<C: ContainerRuntime + ?Sized>(
    runtime: &C,
    request: &RunRequest,
    user: Option<&str>,
) -> Result<PathBuf, PgapError> {
    prepare_output(&request.output_dir)?;
    let paths = RunPaths::resolve(request)?;
    write_manifest(&request.input_file, &paths.manifest, request.report)?;
    let args = build_run_args(&request.image, &paths, user, request.debug);
    info!(image = %request.image, output = %paths.output_dir.display(), "running workflow");
    runtime.run(&args)?;
    Ok(paths.output_dir)
}

fn absolute(path: &Path) -> Result<PathBuf, PgapError> {
    std::path::absolute(path)
        .map_err(|err| PgapError::Filesystem(format!("resolve {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> RunPaths {
        RunPaths {
            data_dir: PathBuf::from("/work/input-v1"),
            input_dir: PathBuf::from("/home/me"),
            manifest: PathBuf::from("/work/out/pgap_input.yaml"),
            output_dir: PathBuf::from("/work/out"),
            log_dir: PathBuf::from("/work/out/log"),
        }
    }

    #[test]
    fn run_args_layout() {
        let args = build_run_args("ncbi/pgap:v1", &paths(), Some("1000:1000"), false);
        assert_eq!(
            args,
            vec![
                "run",
                "-i",
                "--user",
                "1000:1000",
                "--volume",
                "/work/input-v1:/pgap/input:ro",
                "--volume",
                "/home/me:/pgap/user_input",
                "--volume",
                "/work/out/pgap_input.yaml:/pgap/user_input/pgap_input.yaml:ro",
                "--volume",
                "/work/out:/pgap/output:rw",
                "--volume",
                "/work/out/log:/log/srv",
                "ncbi/pgap:v1",
                "cwltool",
                "--outdir",
                "/pgap/output",
                "pgap.cwl",
                "/pgap/user_input/pgap_input.yaml",
            ]
        );
    }

    #[test]
    fn debug_flags_precede_workflow() {
        let args = build_run_args("img", &paths(), None, true);
        assert!(!args.contains(&"--user".to_string()));
        let outdir = args.iter().position(|a| a == "--outdir").unwrap();
        let leave = args.iter().position(|a| a == "--leave-tmpdir").unwrap();
        let cwl = args.iter().position(|a| a == "pgap.cwl").unwrap();
        assert!(outdir < leave && leave < cwl);
        assert!(args.contains(&"--copy-outputs".to_string()));
    }

    #[test]
    fn manifest_appends_keys() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("input.yaml");
        fs::write(&input, "fasta:\n  class: File\n  location: genome.fna").unwrap();

        let manifest = temp.path().join("manifest.yaml");
        write_manifest(&input, &manifest, ReportUsage::False).unwrap();
        assert_eq!(
            fs::read_to_string(&manifest).unwrap(),
            "fasta:\n  class: File\n  location: genome.fna\n\
             supplemental_data: { class: Directory, location: /pgap/input }\n\
             report_usage: false\n"
        );

        write_manifest(&input, &manifest, ReportUsage::Unset).unwrap();
        let content = fs::read_to_string(&manifest).unwrap();
        assert!(!content.contains("report_usage"));
    }

    #[test]
    fn existing_output_is_refused() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("output");
        prepare_output(&output).unwrap();
        assert!(output.join("log").is_dir());
        assert!(matches!(
            prepare_output(&output),
            Err(PgapError::OutputExists(_))
        ));
    }
}
