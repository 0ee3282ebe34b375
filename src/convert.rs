//! One conversion run: SCARF events in, SARIF emission calls out.

use crate::error::{ConvertError, Result};
use crate::hashes::{DuplicatePolicy, HashTable};
use crate::paths::base_ids::{ArtifactLocation, BaseIdSet};
use crate::paths::uri::{dir_uri, encode, file_uri};
use crate::paths::{normalize, rebase};
use crate::sarif::model::{Conversion, Driver, Invocation, InvocationProperties, Tool};
use crate::sarif::time::{normalize_timestamp, sarif_timestamp};
use crate::sarif::{EndMetadata, ExternalSections, RunMetadata, SarifWriter, ToolInfo, WriterOptions};
use crate::scarf::{ScarfHandler, ScarfReader};
use crate::shell;
use crate::summary;
use crate::types::invocation::AssessmentSummary;
use crate::types::scarf::{BugInstance, InitialData};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const SIDECAR_SUFFIX: &str = ".external.sarif-external-properties.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// The analysis tool itself failed: there is no SCARF report, only the
    /// assessment summary describing what was run.
    FailureRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentPolicy {
    Full,
    AllowList(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub scarf: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub hashes: Option<PathBuf>,
    pub build_dir: Option<String>,
    pub output: PathBuf,
    pub external: ExternalSections,
    pub pretty: bool,
    pub failed: bool,
    pub environment: EnvironmentPolicy,
    pub hash_duplicates: DuplicatePolicy,
    pub hash_algorithm: String,
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<Mode> {
        if self.failed {
            if self.scarf.is_some() {
                return Err(ConvertError::Options(
                    "a SCARF report cannot be converted in failure-record mode".to_string(),
                ));
            }
            if self.summary.is_none() {
                return Err(ConvertError::Options(
                    "failure-record mode requires an assessment summary (--summary)".to_string(),
                ));
            }
            Ok(Mode::FailureRecord)
        } else {
            if self.scarf.is_none() {
                return Err(ConvertError::Options(
                    "a SCARF report is required unless --failed is given".to_string(),
                ));
            }
            Ok(Mode::Normal)
        }
    }
}

/// How this process was invoked, captured once when it starts.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub args: Vec<String>,
    pub working_dir: String,
    pub start_time: DateTime<Utc>,
}

impl ProcessInfo {
    pub fn capture() -> Result<Self> {
        Ok(Self {
            args: std::env::args_os()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            working_dir: std::env::current_dir()?.to_string_lossy().into_owned(),
            start_time: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    pub results: usize,
    pub invocations: usize,
    pub output: PathBuf,
    pub sidecar: Option<PathBuf>,
}

/// Environment snapshot for the conversion record, filtered by `policy`.
pub fn snapshot_environment<I>(vars: I, policy: &EnvironmentPolicy) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(name, _)| match policy {
            EnvironmentPolicy::Full => true,
            EnvironmentPolicy::AllowList(allowed) => allowed.iter().any(|allow| allow == name),
        })
        .collect()
}

fn process_environment() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

type Staged = BufWriter<NamedTempFile>;

pub fn convert(options: &ConvertOptions, process: &ProcessInfo) -> Result<ConvertReport> {
    let mode = options.validate()?;
    let dir = output_dir(&options.output);
    let sidecar_path = options.external.any().then(|| sidecar_path(&options.output));

    let writer_options = WriterOptions {
        pretty: options.pretty,
        external: options.external,
        hash_algorithm: options.hash_algorithm.clone(),
    };
    let main = staging_file(dir)?;
    let writer = match &sidecar_path {
        Some(path) => SarifWriter::with_sidecar(
            main,
            staging_file(dir)?,
            &sidecar_uri(path),
            writer_options,
        ),
        None => SarifWriter::new(main, writer_options),
    };

    let mut session = Session::new(options, process, writer);
    session.writer.begin_file()?;
    match mode {
        Mode::Normal => {
            let scarf = options
                .scarf
                .as_deref()
                .ok_or_else(|| ConvertError::Options("missing SCARF report".to_string()))?;
            info!(scarf = %scarf.display(), "converting SCARF report");
            ScarfReader::open(scarf)?.parse(&mut session)?;
        }
        Mode::FailureRecord => {
            let path = options
                .summary
                .as_deref()
                .ok_or_else(|| ConvertError::Options("missing assessment summary".to_string()))?;
            info!(summary = %path.display(), "recording failed assessment");
            let summary = summary::parse_summary(path)?;
            let initial = initial_from_summary(&summary);
            session.summary = Some(summary);
            session.on_run_begin(&initial)?;
        }
    }

    let (results, invocations) = (session.results, session.invocations);
    let (main, sidecar) = session.finish()?;

    if let (Some(path), Some(file)) = (&sidecar_path, sidecar) {
        persist(file, path)?;
    }
    if let Err(err) = persist(main, &options.output) {
        if let Some(path) = &sidecar_path {
            // the sidecar is meaningless without the log referencing it
            let _ = std::fs::remove_file(path);
        }
        return Err(err);
    }
    info!(results, invocations, output = %options.output.display(), "wrote SARIF log");

    Ok(ConvertReport {
        results,
        invocations,
        output: options.output.clone(),
        sidecar: sidecar_path,
    })
}

/// Conversion state threaded through the reader callbacks.
struct Session<'a, W: Write> {
    options: &'a ConvertOptions,
    process: &'a ProcessInfo,
    writer: SarifWriter<W>,
    base_ids: Option<BaseIdSet>,
    /// Summary parsed ahead of the run (failure-record mode).
    summary: Option<AssessmentSummary>,
    results: usize,
    invocations: usize,
}

impl<'a, W: Write> Session<'a, W> {
    fn new(options: &'a ConvertOptions, process: &'a ProcessInfo, writer: SarifWriter<W>) -> Self {
        Self {
            options,
            process,
            writer,
            base_ids: None,
            summary: None,
            results: 0,
            invocations: 0,
        }
    }

    fn source_name(&self) -> String {
        self.options
            .scarf
            .as_ref()
            .or(self.options.summary.as_ref())
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    }

    fn load_summary(&mut self) -> Result<Option<AssessmentSummary>> {
        if let Some(summary) = self.summary.take() {
            return Ok(Some(summary));
        }
        self.options
            .summary
            .as_deref()
            .map(summary::parse_summary)
            .transpose()
    }

    fn finish(mut self) -> Result<(W, Option<W>)> {
        let base_ids = self
            .base_ids
            .take()
            .ok_or_else(|| ConvertError::malformed(self.source_name(), "report never began a run"))?;
        self.writer.end_results()?;

        let hashes = match self.options.hashes.as_deref() {
            Some(path) => Some(HashTable::load(path, self.options.hash_duplicates)?),
            None => None,
        };
        let conversion = self.conversion(&base_ids);
        self.writer.end_run(&EndMetadata {
            conversion,
            hashes: hashes.as_ref(),
        })?;
        self.writer.end_file()
    }

    fn conversion(&self, base_ids: &BaseIdSet) -> Conversion {
        let process = self.process;
        let environment = snapshot_environment(process_environment(), &self.options.environment);
        let analysis_tool_log_files = self
            .options
            .scarf
            .iter()
            .map(|path| {
                let absolute = rebase(".", &process.working_dir, &path.to_string_lossy());
                base_ids.locate_result_file(&absolute)
            })
            .collect();

        Conversion {
            tool: Tool {
                driver: Driver {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: Some(env!("CARGO_PKG_VERSION").to_string()),
                    information_uri: None,
                },
            },
            invocation: Invocation {
                command_line: shell::quote_command(&process.args),
                arguments: process.args.clone(),
                executable_location: None,
                working_directory: Some(ArtifactLocation {
                    uri: dir_uri(&file_uri(&normalize(&process.working_dir))),
                    uri_base_id: None,
                }),
                environment_variables: environment,
                start_time_utc: Some(sarif_timestamp(&process.start_time)),
                end_time_utc: Some(sarif_timestamp(&Utc::now())),
                exit_code: None,
                execution_successful: true,
                properties: InvocationProperties::default(),
            },
            analysis_tool_log_files,
        }
    }
}

impl<W: Write> ScarfHandler for Session<'_, W> {
    fn on_run_begin(&mut self, initial: &InitialData) -> Result<()> {
        let build_root = self
            .options
            .build_dir
            .clone()
            .or_else(|| initial.build_root_dir.clone())
            .ok_or_else(|| ConvertError::malformed(self.source_name(), "no build root directory"))?;
        let package_root = initial
            .package_root_dir
            .clone()
            .ok_or_else(|| ConvertError::malformed(self.source_name(), "no package root directory"))?;
        let base_ids = BaseIdSet::new(&build_root, &package_root)?;
        debug!(
            build_root = base_ids.build_root(),
            results_root = base_ids.results_root(),
            "derived base directories"
        );

        self.writer.begin_run(&RunMetadata {
            assessment_uuid: initial.uuid.clone(),
            assessment_start_time: initial
                .assessment_start_ts
                .as_deref()
                .map(normalize_timestamp),
            package_name: initial.package_name.clone(),
            package_version: initial.package_version.clone(),
            platform_name: initial.platform_name.clone(),
            parser_framework_version: initial.parser_fw_version.clone(),
        })?;
        self.writer.add_tool_data(&ToolInfo {
            name: initial
                .tool_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            version: initial.tool_version.clone(),
        })?;
        self.writer.add_base_id_set(&base_ids)?;

        if let Some(summary) = self.load_summary()? {
            check_package_root(&summary, &base_ids)?;
            self.writer.add_invocations(&summary.invocations)?;
            self.invocations = summary.invocations.len();
        }
        self.writer.begin_results()?;
        self.base_ids = Some(base_ids);
        Ok(())
    }

    fn on_finding(&mut self, bug: BugInstance) -> Result<()> {
        self.writer.add_result(&bug)?;
        self.results += 1;
        Ok(())
    }
}

/// The summary and the report must describe the same package root.
pub fn check_package_root(summary: &AssessmentSummary, base_ids: &BaseIdSet) -> Result<()> {
    let declared = rebase(".", base_ids.build_root(), &summary.package_root_dir);
    let expected = base_ids.package_root_path();
    if declared == expected {
        Ok(())
    } else {
        Err(ConvertError::Consistency(format!(
            "assessment summary package root '{declared}' does not match report package root '{expected}'"
        )))
    }
}

fn initial_from_summary(summary: &AssessmentSummary) -> InitialData {
    InitialData {
        tool_name: summary.tool_type.clone(),
        tool_version: summary.tool_version.clone(),
        uuid: summary.uuid.clone(),
        assessment_start_ts: summary.start_ts.clone(),
        build_root_dir: summary.build_root_dir.clone(),
        package_root_dir: Some(summary.package_root_dir.clone()),
        package_name: summary.package_name.clone(),
        package_version: summary.package_version.clone(),
        parser_fw_version: None,
        platform_name: summary.platform_name.clone(),
    }
}

fn output_dir(output: &Path) -> &Path {
    output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(SIDECAR_SUFFIX);
    output.with_file_name(name)
}

fn sidecar_uri(path: &Path) -> String {
    path.file_name()
        .map(|name| encode(&name.to_string_lossy()))
        .unwrap_or_default()
}

/// Temp file next to the final output. On unix it is created with the
/// mode an ordinary file would get (0666 less the umask).
fn staging_file(dir: &Path) -> Result<Staged> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".scarf-to-sarif");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    Ok(BufWriter::new(builder.tempfile_in(dir)?))
}

fn persist(file: Staged, path: &Path) -> Result<()> {
    let file = file.into_inner().map_err(|e| e.into_error())?;
    file.persist(path).map_err(|e| ConvertError::Io(e.error))?;
    debug!(file = %path.display(), "persisted output");
    Ok(())
}
