use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::PgapError;
use crate::runtime::ContainerRuntime;

pub const PROBE_SHELL: &str = "df -k /cwd /tmp ; ulimit -a ; cat /proc/{meminfo,cpuinfo}";

pub const MIN_OPEN_FILES: f64 = 8000.0;
pub const MIN_USER_PROCESSES: f64 = 100.0;
pub const MIN_WORK_DISK_GIB: f64 = 80.0;
pub const MIN_TMP_DISK_GIB: f64 = 10.0;
pub const MIN_MEMORY_GIB: f64 = 8.0;
pub const MIN_MEMORY_PER_CORE_GIB: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    Unlimited,
    Value(f64),
}

impl Serialize for Setting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Setting::Unlimited => serializer.serialize_str("unlimited"),
            Setting::Value(value) => serializer.serialize_f64(*value),
        }
    }
}

impl Setting {
    fn parse(raw: &str) -> Result<Self, PgapError> {
        if raw == "unlimited" {
            return Ok(Setting::Unlimited);
        }
        raw.parse::<f64>()
            .map(Setting::Value)
            .map_err(|_| PgapError::Probe(format!("non-numeric limit {raw:?}")))
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Unlimited => write!(f, "unlimited"),
            Setting::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Resource settings observed inside the pipeline container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeSettings {
    pub image: String,
    pub open_files: Setting,
    pub max_user_processes: Setting,
    pub virtual_memory: Option<Setting>,
    pub work_disk_gib: f64,
    pub tmp_disk_gib: f64,
    pub memory_gib: f64,
    pub cpu_cores: usize,
    pub cpu_model: Option<String>,
    pub memory_per_core_gib: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingWarning {
    pub name: &'static str,
    pub value: f64,
    pub minimum: f64,
}

impl fmt::Display for SettingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WARNING: {} is less than the recommended value of {}",
            self.name, self.minimum
        )
    }
}

/// Argument list for `<runtime> run ...` that dumps disk, limit, memory and
/// cpu information from inside `image`.
pub fn probe_args(image: &str, cwd: &Path) -> Vec<String> {
    vec![
        "run".to_string(),
        "-i".to_string(),
        "-v".to_string(),
        format!("{}:/cwd", cwd.display()),
        image.to_string(),
        "bash".to_string(),
        "-c".to_string(),
        PROBE_SHELL.to_string(),
    ]
}

pub fn probe<C: ContainerRuntime + ?Sized>(
    runtime: &C,
    image: &str,
    cwd: &Path,
) -> Result<RuntimeSettings, PgapError> {
    let output = runtime.capture(&probe_args(image, cwd))?;
    parse_probe_output(image, &output)
}

pub fn parse_probe_output(image: &str, output: &str) -> Result<RuntimeSettings, PgapError> {
    let limit_re = pattern(r"(?m)^(open files|max user processes|virtual memory) .* (\S+)$")?;
    let df_re = pattern(
        r"(?m)^Filesystem.*\n\S+ +\d+ +\d+ +(\d+) +\S+ +/\S*\n\S+ +\d+ +\d+ +(\d+) +\S+ +/\S*$",
    )?;
    let mem_re = pattern(r"(?m)^MemTotal:\s+(\d+) kB")?;
    let cpu_re = pattern(r"(?m)^model name\s+:\s+(.*)$")?;

    let mut open_files = None;
    let mut max_user_processes = None;
    let mut virtual_memory = None;
    for caps in limit_re.captures_iter(output) {
        let value = Setting::parse(&caps[2])?;
        match &caps[1] {
            "open files" => open_files = Some(value),
            "max user processes" => max_user_processes = Some(value),
            _ => virtual_memory = Some(value),
        }
    }

    let disk = df_re
        .captures(output)
        .ok_or_else(|| PgapError::Probe("missing df output for /cwd and /tmp".to_string()))?;
    let work_disk_gib = kib_to_gib(&disk[1])?;
    let tmp_disk_gib = kib_to_gib(&disk[2])?;

    let memory = mem_re
        .captures(output)
        .ok_or_else(|| PgapError::Probe("missing MemTotal".to_string()))?;
    let memory_gib = kib_to_gib(&memory[1])?;

    let mut cpu_cores = 0usize;
    let mut cpu_model = None;
    for caps in cpu_re.captures_iter(output) {
        cpu_cores += 1;
        cpu_model = Some(caps[1].trim().to_string());
    }
    if cpu_cores == 0 {
        return Err(PgapError::Probe("no cpu model lines".to_string()));
    }

    Ok(RuntimeSettings {
        image: image.to_string(),
        open_files: open_files
            .ok_or_else(|| PgapError::Probe("missing open files limit".to_string()))?,
        max_user_processes: max_user_processes
            .ok_or_else(|| PgapError::Probe("missing max user processes limit".to_string()))?,
        virtual_memory,
        work_disk_gib,
        tmp_disk_gib,
        memory_gib,
        cpu_cores,
        cpu_model,
        memory_per_core_gib: round1(memory_gib / cpu_cores as f64),
    })
}

/// Settings below the recommended minimums. Unlimited limits always pass.
pub fn check_settings(settings: &RuntimeSettings) -> Vec<SettingWarning> {
    [
        ("open files", settings.open_files, MIN_OPEN_FILES),
        (
            "max user processes",
            settings.max_user_processes,
            MIN_USER_PROCESSES,
        ),
        (
            "work disk space (GiB)",
            Setting::Value(settings.work_disk_gib),
            MIN_WORK_DISK_GIB,
        ),
        (
            "tmp disk space (GiB)",
            Setting::Value(settings.tmp_disk_gib),
            MIN_TMP_DISK_GIB,
        ),
        (
            "memory (GiB)",
            Setting::Value(settings.memory_gib),
            MIN_MEMORY_GIB,
        ),
        (
            "memory per CPU core (GiB)",
            Setting::Value(settings.memory_per_core_gib),
            MIN_MEMORY_PER_CORE_GIB,
        ),
    ]
    .into_iter()
    .filter_map(|(name, value, minimum)| check_setting(name, value, minimum))
    .collect()
}

pub fn check_setting(name: &'static str, value: Setting, minimum: f64) -> Option<SettingWarning> {
    match value {
        Setting::Value(value) if value < minimum => Some(SettingWarning {
            name,
            value,
            minimum,
        }),
        _ => None,
    }
}

fn pattern(re: &str) -> Result<Regex, PgapError> {
    Regex::new(re).map_err(|err| PgapError::Probe(err.to_string()))
}

fn kib_to_gib(raw: &str) -> Result<f64, PgapError> {
    let kib = raw
        .parse::<u64>()
        .map_err(|_| PgapError::Probe(format!("non-numeric size {raw:?}")))?;
    Ok(round1(kib as f64 / 1024.0 / 1024.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
