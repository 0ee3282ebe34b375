//! Streaming SCARF reader. The document is never held in memory: run
//! metadata and each `<BugInstance>` are handed to a [`ScarfHandler`] as
//! soon as they are complete.

use crate::error::{ConvertError, Result};
use crate::types::scarf::{BugInstance, InitialData, InstanceLocation, Location, Method};
use crate::xml::{Node, Tag, XmlCursor};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Callbacks invoked synchronously, in document order, by
/// [`ScarfReader::parse`]. The handler itself carries the conversion state.
pub trait ScarfHandler {
    fn on_run_begin(&mut self, initial: &InitialData) -> Result<()>;
    fn on_finding(&mut self, bug: BugInstance) -> Result<()>;
}

pub struct ScarfReader<R> {
    cursor: XmlCursor<R>,
}

impl ScarfReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            cursor: XmlCursor::open(path)?,
        })
    }
}

impl<R: BufRead> ScarfReader<R> {
    #[cfg(test)]
    pub fn new(input: R, source: &str) -> Self {
        Self {
            cursor: XmlCursor::new(input, source),
        }
    }

    /// One full pass over the document. Returns once the report element
    /// is closed; no callback fires afterwards.
    pub fn parse<H: ScarfHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            match self.cursor.next_node()? {
                Node::Start(tag) if tag.name == "AnalyzerReport" => {
                    handler.on_run_begin(&initial_data(&tag))?;
                    return self.read_report_body(handler);
                }
                Node::Empty(tag) if tag.name == "AnalyzerReport" => {
                    return handler.on_run_begin(&initial_data(&tag));
                }
                Node::Start(_) => self.cursor.skip()?,
                Node::Empty(_) | Node::Text(_) | Node::End => {}
                Node::Eof => {
                    return Err(ConvertError::malformed(
                        self.cursor.source(),
                        "missing <AnalyzerReport> element",
                    ))
                }
            }
        }
    }

    fn read_report_body<H: ScarfHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            match self.cursor.next_node()? {
                Node::Start(tag) if tag.name == "BugInstance" => {
                    let bug = self.read_bug(&tag)?;
                    handler.on_finding(bug)?;
                }
                Node::Empty(tag) if tag.name == "BugInstance" => {
                    handler.on_finding(BugInstance {
                        id: tag.attr("id").map(ToString::to_string),
                        ..BugInstance::default()
                    })?;
                }
                // Metric, BugSummary, MetricSummaries and anything unknown
                Node::Start(_) => self.cursor.skip()?,
                Node::End => return Ok(()),
                Node::Empty(_) | Node::Text(_) => {}
                Node::Eof => return Err(self.cursor.unexpected_eof()),
            }
        }
    }

    fn read_bug(&mut self, start: &Tag) -> Result<BugInstance> {
        let mut bug = BugInstance {
            id: start.attr("id").map(ToString::to_string),
            ..BugInstance::default()
        };
        let mut scopes = vec![BugScope::Bug];
        let mut location: Option<Location> = None;

        while let Some(&scope) = scopes.last() {
            let (tag, empty) = match self.cursor.next_node()? {
                Node::Start(tag) => (tag, false),
                Node::Empty(tag) => (tag, true),
                Node::End => {
                    if scopes.pop() == Some(BugScope::Location) {
                        bug.locations.extend(location.take());
                    }
                    continue;
                }
                Node::Text(_) => continue,
                Node::Eof => return Err(self.cursor.unexpected_eof()),
            };

            let nested = match (scope, tag.name.as_str()) {
                (BugScope::Bug, "Methods") => Some(BugScope::Methods),
                (BugScope::Bug, "BugLocations") => Some(BugScope::Locations),
                (BugScope::Bug, "BugTrace") => Some(BugScope::Trace),
                (BugScope::Locations, "Location") => {
                    location = Some(Location {
                        id: tag.attr("id").map(ToString::to_string),
                        primary: is_true(tag.attr("primary")),
                        ..Location::default()
                    });
                    Some(BugScope::Location)
                }
                (BugScope::Trace, "InstanceLocation") => {
                    bug.instance_location.get_or_insert_with(InstanceLocation::default);
                    Some(BugScope::InstanceLocation)
                }
                (BugScope::InstanceLocation, "LineNum") => Some(BugScope::LineNum),
                _ => None,
            };
            if let Some(nested) = nested {
                if empty {
                    if nested == BugScope::Location {
                        bug.locations.extend(location.take());
                    }
                } else {
                    scopes.push(nested);
                }
                continue;
            }

            let Some(field) = leaf_field(scope, &tag.name) else {
                if !empty {
                    self.cursor.skip()?;
                }
                continue;
            };
            let value = if empty { String::new() } else { self.cursor.text()? };
            self.assign(&mut bug, location.as_mut(), &tag, field, value)?;
        }
        Ok(bug)
    }

    fn assign(
        &self,
        bug: &mut BugInstance,
        location: Option<&mut Location>,
        tag: &Tag,
        field: BugField,
        value: String,
    ) -> Result<()> {
        match field {
            BugField::ClassName => bug.class_name = Some(value),
            BugField::Method => bug.methods.push(Method {
                id: tag.attr("id").map(ToString::to_string),
                primary: is_true(tag.attr("primary")),
                name: value,
            }),
            BugField::CweId => {
                let id = self.number(&tag.name, &value)?;
                bug.cwe_ids.push(id);
            }
            BugField::Group => bug.group = Some(value),
            BugField::Code => bug.code = Some(value),
            BugField::Rank => bug.rank = Some(value),
            BugField::Severity => bug.severity = Some(value),
            BugField::Message => bug.message = Some(value),
            BugField::Suggestion => bug.resolution_suggestion = Some(value),
            BugField::BuildId => bug.build_id = Some(value),
            BugField::ReportFile => bug.assessment_report_file = Some(value),
            BugField::Xpath => {
                bug.instance_location
                    .get_or_insert_with(InstanceLocation::default)
                    .xpath = Some(value)
            }
            BugField::TraceStart | BugField::TraceEnd => {
                let line = Some(self.number(&tag.name, &value)?);
                let instance = bug
                    .instance_location
                    .get_or_insert_with(InstanceLocation::default);
                if field == BugField::TraceStart {
                    instance.start_line = line;
                } else {
                    instance.end_line = line;
                }
            }
            _ => {
                let Some(location) = location else {
                    return Ok(());
                };
                match field {
                    BugField::SourceFile => location.source_file = Some(value),
                    BugField::Explanation => location.explanation = Some(value),
                    BugField::StartLine => location.start_line = Some(self.number(&tag.name, &value)?),
                    BugField::EndLine => location.end_line = Some(self.number(&tag.name, &value)?),
                    BugField::StartColumn => {
                        location.start_column = Some(self.number(&tag.name, &value)?)
                    }
                    BugField::EndColumn => location.end_column = Some(self.number(&tag.name, &value)?),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn number<T: FromStr>(&self, element: &str, value: &str) -> Result<T> {
        value.trim().parse::<T>().map_err(|_| {
            ConvertError::malformed(
                self.cursor.source(),
                format!(
                    "<{element}> in {} is not a number: '{value}'",
                    self.cursor.location()
                ),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BugScope {
    Bug,
    Methods,
    Locations,
    Location,
    Trace,
    InstanceLocation,
    LineNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BugField {
    ClassName,
    Method,
    CweId,
    Group,
    Code,
    Rank,
    Severity,
    Message,
    Suggestion,
    SourceFile,
    StartLine,
    EndLine,
    StartColumn,
    EndColumn,
    Explanation,
    BuildId,
    ReportFile,
    Xpath,
    TraceStart,
    TraceEnd,
}

fn leaf_field(scope: BugScope, name: &str) -> Option<BugField> {
    let field = match (scope, name) {
        (BugScope::Bug, "ClassName") => BugField::ClassName,
        (BugScope::Bug, "CweId") => BugField::CweId,
        (BugScope::Bug, "BugGroup") => BugField::Group,
        (BugScope::Bug, "BugCode") => BugField::Code,
        (BugScope::Bug, "BugRank") => BugField::Rank,
        (BugScope::Bug, "BugSeverity") => BugField::Severity,
        (BugScope::Bug, "BugMessage") => BugField::Message,
        (BugScope::Bug, "ResolutionSuggestion") => BugField::Suggestion,
        (BugScope::Methods, "Method") => BugField::Method,
        (BugScope::Location, "SourceFile") => BugField::SourceFile,
        (BugScope::Location, "StartLine") => BugField::StartLine,
        (BugScope::Location, "EndLine") => BugField::EndLine,
        (BugScope::Location, "StartColumn") => BugField::StartColumn,
        (BugScope::Location, "EndColumn") => BugField::EndColumn,
        (BugScope::Location, "Explanation") => BugField::Explanation,
        (BugScope::Trace, "BuildId") => BugField::BuildId,
        (BugScope::Trace, "AssessmentReportFile") => BugField::ReportFile,
        (BugScope::InstanceLocation, "Xpath") => BugField::Xpath,
        (BugScope::LineNum, "Start") => BugField::TraceStart,
        (BugScope::LineNum, "End") => BugField::TraceEnd,
        _ => return None,
    };
    Some(field)
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true" | "1"))
}

fn initial_data(tag: &Tag) -> InitialData {
    let attr = |key: &str| tag.attr(key).map(ToString::to_string);
    InitialData {
        tool_name: attr("tool_name"),
        tool_version: attr("tool_version"),
        uuid: attr("uuid"),
        assessment_start_ts: attr("assessment_start_ts"),
        build_root_dir: attr("build_root_dir"),
        package_root_dir: attr("package_root_dir"),
        package_name: attr("package_name"),
        package_version: attr("package_version"),
        parser_fw_version: attr("parser_fw_version"),
        platform_name: attr("platform_name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Collector {
        initial: Vec<InitialData>,
        bugs: Vec<BugInstance>,
    }

    impl ScarfHandler for Collector {
        fn on_run_begin(&mut self, initial: &InitialData) -> Result<()> {
            self.initial.push(initial.clone());
            Ok(())
        }

        fn on_finding(&mut self, bug: BugInstance) -> Result<()> {
            self.bugs.push(bug);
            Ok(())
        }
    }

    fn collect(xml: &str) -> Result<Collector> {
        let mut reader = ScarfReader::new(Cursor::new(xml.as_bytes().to_vec()), "scarf.xml");
        let mut collector = Collector::default();
        reader.parse(&mut collector)?;
        Ok(collector)
    }

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AnalyzerReport tool_name="cppcheck" tool_version="2.13" uuid="0f6c7e2a-1d2b-4c3d-8e9f-001122334455"
    assessment_start_ts="1498151327.4" build_root_dir="/tmp/build" package_root_dir="pkg"
    package_name="demo" package_version="1.0" parser_fw_version="3.2" platform_name="ubuntu">
  <BugInstance id="1">
    <ClassName>Widget</ClassName>
    <Methods>
      <Method id="1" primary="true">draw</Method>
    </Methods>
    <BugLocations>
      <Location id="1" primary="true">
        <SourceFile>pkg/src/widget.c</SourceFile>
        <StartLine>10</StartLine>
        <EndLine>12</EndLine>
        <StartColumn>3</StartColumn>
        <Explanation>null dereference</Explanation>
      </Location>
      <Location id="2" primary="false">
        <SourceFile>pkg/src/util.h</SourceFile>
        <StartLine>4</StartLine>
      </Location>
    </BugLocations>
    <CweId>476</CweId>
    <CweId>690</CweId>
    <BugGroup>error</BugGroup>
    <BugCode>nullPointer</BugCode>
    <BugMessage>Possible null pointer dereference: p</BugMessage>
    <BugSeverity>error</BugSeverity>
    <BugTrace>
      <BuildId>1</BuildId>
      <AssessmentReportFile>assessment-report-1.xml</AssessmentReportFile>
      <InstanceLocation>
        <Xpath>/results/error[1]</Xpath>
        <LineNum><Start>5</Start><End>9</End></LineNum>
      </InstanceLocation>
    </BugTrace>
  </BugInstance>
  <BugInstance id="2"/>
  <Metric id="1"><Value>3</Value></Metric>
  <BugSummary><BugCategory group="error" code="nullPointer" count="1" bytes="0"/></BugSummary>
</AnalyzerReport>
"#;

    #[test]
    fn run_begin_carries_report_attributes() {
        let collected = collect(REPORT).expect("report should parse");
        assert_eq!(collected.initial.len(), 1);
        let initial = &collected.initial[0];
        assert_eq!(initial.tool_name.as_deref(), Some("cppcheck"));
        assert_eq!(initial.build_root_dir.as_deref(), Some("/tmp/build"));
        assert_eq!(initial.package_root_dir.as_deref(), Some("pkg"));
        assert_eq!(initial.platform_name.as_deref(), Some("ubuntu"));
    }

    #[test]
    fn bug_instances_are_fully_decoded() {
        let collected = collect(REPORT).expect("report should parse");
        assert_eq!(collected.bugs.len(), 2);

        let bug = &collected.bugs[0];
        assert_eq!(bug.id.as_deref(), Some("1"));
        assert_eq!(bug.class_name.as_deref(), Some("Widget"));
        assert_eq!(bug.methods.len(), 1);
        assert!(bug.methods[0].primary);
        assert_eq!(bug.methods[0].name, "draw");
        assert_eq!(bug.locations.len(), 2);
        assert_eq!(bug.locations[0].source_file.as_deref(), Some("pkg/src/widget.c"));
        assert_eq!(bug.locations[0].start_line, Some(10));
        assert_eq!(bug.locations[0].end_line, Some(12));
        assert_eq!(bug.locations[0].start_column, Some(3));
        assert_eq!(bug.locations[0].end_column, None);
        assert!(!bug.locations[1].primary);
        assert_eq!(bug.cwe_ids, vec![476, 690]);
        assert_eq!(bug.code.as_deref(), Some("nullPointer"));
        assert_eq!(bug.assessment_report_file.as_deref(), Some("assessment-report-1.xml"));
        let instance = bug.instance_location.as_ref().expect("instance location");
        assert_eq!(instance.xpath.as_deref(), Some("/results/error[1]"));
        assert_eq!((instance.start_line, instance.end_line), (Some(5), Some(9)));

        assert_eq!(collected.bugs[1].id.as_deref(), Some("2"));
        assert!(collected.bugs[1].locations.is_empty());
    }

    #[test]
    fn empty_report_begins_run_without_findings() {
        let collected =
            collect(r#"<AnalyzerReport build_root_dir="/b" package_root_dir="p"/>"#).expect("parse");
        assert_eq!(collected.initial.len(), 1);
        assert!(collected.bugs.is_empty());
    }

    #[test]
    fn missing_report_element_is_malformed() {
        let err = collect("<Other/>").err().expect("no AnalyzerReport");
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }

    #[test]
    fn non_numeric_line_is_malformed() {
        let err = collect(
            "<AnalyzerReport><BugInstance id=\"1\"><BugLocations><Location id=\"1\">\
             <StartLine>ten</StartLine></Location></BugLocations></BugInstance></AnalyzerReport>",
        )
        .err()
        .expect("line must be numeric");
        assert!(err.to_string().contains("StartLine"));
    }

    #[test]
    fn markup_in_text_element_is_structural_error() {
        let err = collect(
            "<AnalyzerReport><BugInstance id=\"1\"><BugMessage>a<b>b</b></BugMessage>\
             </BugInstance></AnalyzerReport>",
        )
        .err()
        .expect("message holds markup");
        assert!(matches!(err, ConvertError::Structural(_)));
        assert!(err
            .to_string()
            .contains("/AnalyzerReport/BugInstance/BugMessage"));
    }
}
