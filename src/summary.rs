//! Streaming parser for `assessment-summary.xml`, the record of every build
//! and analysis command run during an assessment.

use crate::error::{ConvertError, Result};
use crate::shell;
use crate::types::invocation::{AssessmentSummary, InvocationRecord};
use crate::xml::{Node, Tag, XmlCursor};
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Document,
    Summary,
    Artifacts,
    Assessment,
    Command,
    Args,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PackageRootDir,
    BuildRootDir,
    Uuid,
    ToolType,
    ToolVersion,
    PackageName,
    PackageVersion,
    PlatformName,
    SummaryStartTs,
    SummaryStopTs,
    ArtifactId,
    ExitCode,
    StartTs,
    StopTs,
    AssessmentReport,
    Cwd,
    Executable,
    Arg,
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Open(Scope),
    Leaf(Field),
    Unknown,
}

fn classify(scope: Scope, name: &str) -> Element {
    use Element::{Leaf, Open};
    match (scope, name) {
        (Scope::Document, "assessment-summary") => Open(Scope::Summary),
        (Scope::Summary, "package-root-dir") => Leaf(Field::PackageRootDir),
        (Scope::Summary, "build-root-dir") => Leaf(Field::BuildRootDir),
        (Scope::Summary, "assessment-summary-uuid") => Leaf(Field::Uuid),
        (Scope::Summary, "tool-type") => Leaf(Field::ToolType),
        (Scope::Summary, "tool-version") => Leaf(Field::ToolVersion),
        (Scope::Summary, "package-name") => Leaf(Field::PackageName),
        (Scope::Summary, "package-version") => Leaf(Field::PackageVersion),
        (Scope::Summary, "platform-name") => Leaf(Field::PlatformName),
        (Scope::Summary, "start-ts") => Leaf(Field::SummaryStartTs),
        (Scope::Summary, "stop-ts") => Leaf(Field::SummaryStopTs),
        (Scope::Summary, "assessment-artifacts") => Open(Scope::Artifacts),
        (Scope::Summary | Scope::Artifacts, "assessment") => Open(Scope::Assessment),
        (Scope::Assessment, "build-artifact-id") => Leaf(Field::ArtifactId),
        (Scope::Assessment, "exit-code") => Leaf(Field::ExitCode),
        (Scope::Assessment, "start-ts") => Leaf(Field::StartTs),
        (Scope::Assessment, "stop-ts") => Leaf(Field::StopTs),
        (Scope::Assessment, "assessment-report") => Leaf(Field::AssessmentReport),
        (Scope::Assessment, "command") => Open(Scope::Command),
        (Scope::Command, "cwd") => Leaf(Field::Cwd),
        (Scope::Command, "executable") => Leaf(Field::Executable),
        (Scope::Command, "args") => Open(Scope::Args),
        (Scope::Command, "environment") => Open(Scope::Environment),
        (Scope::Args, "arg") => Leaf(Field::Arg),
        (Scope::Environment, "env") => Leaf(Field::Env),
        _ => Element::Unknown,
    }
}

pub fn parse_summary(path: &Path) -> Result<AssessmentSummary> {
    let mut cursor = XmlCursor::open(path)?;
    let summary = SummaryParser::default().run(&mut cursor)?;
    debug!(
        invocations = summary.invocations.len(),
        file = %path.display(),
        "parsed assessment summary"
    );
    Ok(summary)
}

#[derive(Default)]
struct SummaryParser {
    scopes: Vec<Scope>,
    summary: AssessmentSummary,
    package_root_dir: Option<String>,
    seen_root: bool,
    /// The `<assessment>` currently being read; moved into the summary when
    /// its element closes.
    scratch: Option<InvocationRecord>,
}

impl SummaryParser {
    fn run<R: BufRead>(mut self, cursor: &mut XmlCursor<R>) -> Result<AssessmentSummary> {
        self.scopes.push(Scope::Document);
        loop {
            match cursor.next_node()? {
                Node::Start(tag) => self.enter(cursor, &tag, false)?,
                Node::Empty(tag) => self.enter(cursor, &tag, true)?,
                Node::End => self.leave(),
                Node::Text(_) => {}
                Node::Eof => break,
            }
        }

        if !self.seen_root {
            return Err(ConvertError::malformed(
                cursor.source(),
                "missing <assessment-summary> element",
            ));
        }
        match self.package_root_dir {
            Some(dir) => self.summary.package_root_dir = dir,
            None => {
                return Err(ConvertError::malformed(
                    cursor.source(),
                    "missing <package-root-dir> element",
                ))
            }
        }
        Ok(self.summary)
    }

    fn scope(&self) -> Scope {
        self.scopes.last().copied().unwrap_or(Scope::Document)
    }

    fn enter<R: BufRead>(&mut self, cursor: &mut XmlCursor<R>, tag: &Tag, empty: bool) -> Result<()> {
        match classify(self.scope(), &tag.name) {
            Element::Open(scope) => {
                if scope == Scope::Summary {
                    self.seen_root = true;
                }
                if scope == Scope::Assessment {
                    self.scratch = Some(InvocationRecord::default());
                }
                self.scopes.push(scope);
                if empty {
                    self.leave();
                }
            }
            Element::Leaf(field) => {
                let value = if empty { String::new() } else { cursor.text()? };
                self.assign(cursor, field, value)?;
            }
            Element::Unknown => {
                if !empty {
                    cursor.skip()?;
                }
            }
        }
        Ok(())
    }

    fn leave(&mut self) {
        if self.scopes.pop() == Some(Scope::Assessment) {
            if let Some(mut record) = self.scratch.take() {
                record.command_line = shell::quote_command(&record.args);
                self.summary.invocations.push(record);
            }
        }
    }

    fn assign<R: BufRead>(&mut self, cursor: &XmlCursor<R>, field: Field, value: String) -> Result<()> {
        let summary = &mut self.summary;
        match field {
            Field::PackageRootDir => self.package_root_dir = Some(value),
            Field::BuildRootDir => summary.build_root_dir = Some(value),
            Field::Uuid => summary.uuid = Some(value),
            Field::ToolType => summary.tool_type = Some(value),
            Field::ToolVersion => summary.tool_version = Some(value),
            Field::PackageName => summary.package_name = Some(value),
            Field::PackageVersion => summary.package_version = Some(value),
            Field::PlatformName => summary.platform_name = Some(value),
            Field::SummaryStartTs => summary.start_ts = Some(value),
            Field::SummaryStopTs => summary.stop_ts = Some(value),
            _ => {
                let Some(record) = self.scratch.as_mut() else {
                    return Ok(());
                };
                assign_invocation(cursor, record, field, value)?;
            }
        }
        Ok(())
    }
}

fn assign_invocation<R: BufRead>(
    cursor: &XmlCursor<R>,
    record: &mut InvocationRecord,
    field: Field,
    value: String,
) -> Result<()> {
    match field {
        Field::ArtifactId => record.artifact_id = value,
        Field::ExitCode => {
            let code = value.trim().parse::<i32>().map_err(|_| {
                ConvertError::malformed(
                    cursor.source(),
                    format!("invalid exit code '{value}' in {}", cursor.location()),
                )
            })?;
            record.exit_code = Some(code);
        }
        Field::StartTs => record.start_ts = Some(value),
        Field::StopTs => record.end_ts = Some(value),
        Field::AssessmentReport => record.assessment_report = Some(value),
        Field::Cwd => record.cwd = Some(value),
        Field::Executable => record.executable = Some(value),
        Field::Arg => record.args.push(value),
        Field::Env => match value.split_once('=') {
            Some((name, val)) if !name.is_empty() => {
                let previous = record.environment.insert(name.to_string(), val.to_string());
                if previous.is_some() {
                    warn!(
                        file = cursor.source(),
                        artifact = %record.artifact_id,
                        variable = name,
                        "duplicate environment variable in assessment summary, keeping last value"
                    );
                }
            }
            _ => warn!(
                file = cursor.source(),
                artifact = %record.artifact_id,
                entry = %value,
                "ignoring environment entry not of the form NAME=VALUE"
            ),
        },
        _ => {}
    }
    Ok(())
}
