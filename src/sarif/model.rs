//! SARIF 2.1.0 fragments and the mapping from SCARF records onto them.

use super::time::normalize_timestamp;
use crate::paths::base_ids::{ArtifactLocation, BaseIdSet, Located};
use crate::types::invocation::InvocationRecord;
use crate::types::scarf::{BugInstance, Location};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub driver: Driver,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u64>,
}

impl Region {
    fn is_empty(&self) -> bool {
        self.start_line.is_none()
            && self.end_line.is_none()
            && self.start_column.is_none()
            && self.end_column.is_none()
    }

    fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexedLocation {
    #[serde(flatten)]
    pub location: ArtifactLocation,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation<L> {
    pub artifact_location: L,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalLocation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_location: Option<PhysicalLocation<IndexedLocation>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logical_locations: Vec<LogicalLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub conversion_sources: Vec<PhysicalLocation<ArtifactLocation>>,
}

/// SCARF fields SARIF has no dedicated slot for.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cwe_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_xpath: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub level: &'static str,
    pub message: Message,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ResultLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_locations: Vec<ResultLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    pub properties: ResultProperties,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_artifact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_report: Option<ArtifactLocation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub command_line: String,
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_location: Option<ArtifactLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<ArtifactLocation>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub execution_successful: bool,
    #[serde(skip_serializing_if = "is_default_properties")]
    pub properties: InvocationProperties,
}

fn is_default_properties(properties: &InvocationProperties) -> bool {
    properties.build_artifact_id.is_none() && properties.assessment_report.is_none()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub tool: Tool,
    pub invocation: Invocation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub analysis_tool_log_files: Vec<ArtifactLocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub location: ArtifactLocation,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: BTreeMap<String, String>,
}

/// Distinct artifact locations in order of first use; the position is the
/// `index` results refer to.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    entries: Vec<Located>,
    index: HashMap<ArtifactLocation, usize>,
}

impl ArtifactRegistry {
    pub fn register(&mut self, located: Located) -> IndexedLocation {
        let index = match self.index.get(&located.location) {
            Some(&index) => index,
            None => {
                let index = self.entries.len();
                self.index.insert(located.location.clone(), index);
                self.entries.push(located.clone());
                index
            }
        };
        IndexedLocation {
            location: located.location,
            index,
        }
    }

    pub fn entries(&self) -> &[Located] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn level_for(severity: Option<&str>) -> &'static str {
    let Some(severity) = severity else {
        return "warning";
    };
    match severity.trim().to_ascii_lowercase().as_str() {
        "error" | "critical" | "high" | "blocker" | "severe" | "major" | "1" => "error",
        "style" | "info" | "information" | "informational" | "low" | "note" | "minor"
        | "performance" | "portability" | "3" | "4" | "5" => "note",
        _ => "warning",
    }
}

/// SARIF line and column numbers start at 1; SCARF tools sometimes emit 0
/// for "unknown".
fn one_based(value: Option<u64>) -> Option<u64> {
    value.filter(|&n| n > 0)
}

fn result_location(
    location: &Location,
    base_ids: &BaseIdSet,
    registry: &mut ArtifactRegistry,
) -> ResultLocation {
    let physical_location = location.source_file.as_deref().map(|file| PhysicalLocation {
        artifact_location: registry.register(base_ids.locate(file)),
        region: Region {
            start_line: one_based(location.start_line),
            end_line: one_based(location.end_line),
            start_column: one_based(location.start_column),
            end_column: one_based(location.end_column),
        }
        .non_empty(),
    });
    ResultLocation {
        id: location.id.as_deref().and_then(|id| id.trim().parse().ok()),
        physical_location,
        logical_locations: Vec::new(),
        message: location.explanation.clone().map(|text| Message { text }),
    }
}

fn logical_locations(bug: &BugInstance) -> Vec<LogicalLocation> {
    let method = bug
        .methods
        .iter()
        .find(|method| method.primary)
        .or_else(|| bug.methods.first())
        .filter(|method| !method.name.is_empty());
    match (bug.class_name.as_deref(), method) {
        (Some(class), Some(method)) => vec![LogicalLocation {
            name: method.name.clone(),
            fully_qualified_name: Some(format!("{class}.{}", method.name)),
            kind: "function",
        }],
        (None, Some(method)) => vec![LogicalLocation {
            name: method.name.clone(),
            fully_qualified_name: None,
            kind: "function",
        }],
        (Some(class), None) => vec![LogicalLocation {
            name: class.to_string(),
            fully_qualified_name: None,
            kind: "type",
        }],
        (None, None) => Vec::new(),
    }
}

/// Map one SCARF finding onto a SARIF result, registering every file it
/// mentions.
pub fn to_result(bug: &BugInstance, base_ids: &BaseIdSet, registry: &mut ArtifactRegistry) -> SarifResult {
    let mut locations = Vec::new();
    let mut related_locations = Vec::new();
    let has_primary = bug.locations.iter().any(|location| location.primary);
    for (idx, location) in bug.locations.iter().enumerate() {
        let converted = result_location(location, base_ids, registry);
        if location.primary || (!has_primary && idx == 0) {
            locations.push(converted);
        } else {
            related_locations.push(converted);
        }
    }

    let logical = logical_locations(bug);
    match locations.first_mut() {
        Some(first) => first.logical_locations = logical,
        None if !logical.is_empty() => locations.push(ResultLocation {
            id: None,
            physical_location: None,
            logical_locations: logical,
            message: None,
        }),
        None => {}
    }

    let provenance = bug.assessment_report_file.as_deref().map(|file| {
        let region = bug.instance_location.as_ref().and_then(|instance| {
            Region {
                start_line: one_based(instance.start_line),
                end_line: one_based(instance.end_line),
                ..Region::default()
            }
            .non_empty()
        });
        Provenance {
            conversion_sources: vec![PhysicalLocation {
                artifact_location: base_ids.locate_result_file(file),
                region,
            }],
        }
    });

    SarifResult {
        rule_id: bug.code.clone().or_else(|| bug.group.clone()),
        level: level_for(bug.severity.as_deref()),
        message: Message {
            text: bug.message.clone().unwrap_or_default(),
        },
        locations,
        related_locations,
        provenance,
        properties: ResultProperties {
            bug_id: bug.id.clone(),
            bug_group: bug.group.clone(),
            bug_code: bug.code.clone(),
            severity: bug.severity.clone(),
            rank: bug.rank.clone(),
            cwe_ids: bug.cwe_ids.clone(),
            build_id: bug.build_id.clone(),
            resolution_suggestion: bug.resolution_suggestion.clone(),
            instance_xpath: bug
                .instance_location
                .as_ref()
                .and_then(|instance| instance.xpath.clone()),
        },
    }
}

/// SARIF invocation for one assessment-summary record. The working
/// directory and a path-qualified executable become base-relative
/// locations.
pub fn to_invocation(record: &InvocationRecord, base_ids: &BaseIdSet) -> Invocation {
    let working_directory = record.cwd.as_deref().map(|cwd| base_ids.locate(cwd).location);
    let current_dir = record.cwd.as_deref().unwrap_or(base_ids.build_root());
    let executable_location = record
        .executable
        .as_deref()
        .filter(|exe| exe.contains('/'))
        .map(|exe| base_ids.locate_from(current_dir, exe).location);

    Invocation {
        command_line: record.command_line.clone(),
        arguments: record.args.clone(),
        executable_location,
        working_directory,
        environment_variables: record.environment.clone(),
        start_time_utc: record.start_ts.as_deref().map(normalize_timestamp),
        end_time_utc: record.end_ts.as_deref().map(normalize_timestamp),
        exit_code: record.exit_code,
        execution_successful: record.exit_code == Some(0),
        properties: InvocationProperties {
            build_artifact_id: Some(record.artifact_id.clone()).filter(|id| !id.is_empty()),
            assessment_report: record
                .assessment_report
                .as_deref()
                .map(|report| base_ids.locate_result_file(report)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::scarf::{InstanceLocation, Method};
    use serde_json::{json, Value};

    fn base_ids() -> BaseIdSet {
        BaseIdSet::new("/tmp/build", "pkg").expect("base ids")
    }

    fn sample_bug() -> BugInstance {
        BugInstance {
            id: Some("7".to_string()),
            class_name: Some("Widget".to_string()),
            methods: vec![Method {
                id: Some("1".to_string()),
                primary: true,
                name: "draw".to_string(),
            }],
            locations: vec![
                Location {
                    id: Some("1".to_string()),
                    primary: true,
                    source_file: Some("pkg/src/w.c".to_string()),
                    start_line: Some(10),
                    end_line: Some(12),
                    ..Location::default()
                },
                Location {
                    id: Some("2".to_string()),
                    primary: false,
                    source_file: Some("/usr/include/stdio.h".to_string()),
                    explanation: Some("declared here".to_string()),
                    ..Location::default()
                },
                Location {
                    id: Some("3".to_string()),
                    primary: false,
                    source_file: Some("pkg/src/w.c".to_string()),
                    start_line: Some(40),
                    ..Location::default()
                },
            ],
            cwe_ids: vec![476],
            code: Some("nullPointer".to_string()),
            severity: Some("Error".to_string()),
            message: Some("null pointer".to_string()),
            assessment_report_file: Some("assessment-report-1.xml".to_string()),
            instance_location: Some(InstanceLocation {
                xpath: Some("/results/error[1]".to_string()),
                start_line: Some(5),
                end_line: None,
            }),
            ..BugInstance::default()
        }
    }

    #[test]
    fn result_splits_primary_and_related_locations() {
        let mut registry = ArtifactRegistry::default();
        let result = to_result(&sample_bug(), &base_ids(), &mut registry);
        let value = serde_json::to_value(&result).expect("serialize");

        assert_eq!(value["ruleId"], "nullPointer");
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"]["text"], "null pointer");
        assert_eq!(
            value["locations"][0]["physicalLocation"],
            json!({
                "artifactLocation": {"uri": "src/w.c", "uriBaseId": "PACKAGEROOT", "index": 0},
                "region": {"startLine": 10, "endLine": 12}
            })
        );
        assert_eq!(
            value["locations"][0]["logicalLocations"][0]["fullyQualifiedName"],
            "Widget.draw"
        );
        let related = value["relatedLocations"].as_array().expect("related");
        assert_eq!(related.len(), 2);
        assert_eq!(
            related[0]["physicalLocation"]["artifactLocation"],
            json!({"uri": "file:///usr/include/stdio.h", "index": 1})
        );
        assert_eq!(related[0]["message"]["text"], "declared here");
        assert_eq!(related[1]["physicalLocation"]["artifactLocation"]["index"], 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn result_records_provenance_and_properties() {
        let mut registry = ArtifactRegistry::default();
        let result = to_result(&sample_bug(), &base_ids(), &mut registry);
        let value = serde_json::to_value(&result).expect("serialize");

        assert_eq!(
            value["provenance"]["conversionSources"][0],
            json!({
                "artifactLocation": {"uri": "assessment-report-1.xml", "uriBaseId": "RESULTSROOT"},
                "region": {"startLine": 5}
            })
        );
        assert_eq!(value["properties"]["bugId"], "7");
        assert_eq!(value["properties"]["cweIds"], json!([476]));
        assert_eq!(value["properties"]["instanceXpath"], "/results/error[1]");
        assert_eq!(value["properties"].get("rank"), None);
    }

    #[test]
    fn first_location_is_primary_when_none_marked() {
        let mut bug = sample_bug();
        for location in &mut bug.locations {
            location.primary = false;
        }
        let result = to_result(&bug, &base_ids(), &mut ArtifactRegistry::default());
        assert_eq!(result.locations.len(), 1);
        assert_eq!(result.related_locations.len(), 2);
    }

    #[test]
    fn zero_lines_and_columns_are_dropped_from_regions() {
        let mut bug = sample_bug();
        bug.locations[0].start_line = Some(0);
        bug.locations[0].end_line = Some(0);
        bug.locations[0].start_column = Some(0);
        bug.locations[0].end_column = Some(7);
        bug.locations[2].start_line = Some(0);
        bug.instance_location = Some(InstanceLocation {
            xpath: None,
            start_line: Some(0),
            end_line: Some(0),
        });
        let mut registry = ArtifactRegistry::default();
        let value: Value = serde_json::to_value(to_result(&bug, &base_ids(), &mut registry))
            .expect("result serializes");

        assert_eq!(
            value["locations"][0]["physicalLocation"]["region"],
            json!({"endColumn": 7})
        );
        assert_eq!(
            value["relatedLocations"][1]["physicalLocation"].get("region"),
            None
        );
        assert_eq!(
            value["provenance"]["conversionSources"][0].get("region"),
            None
        );
    }

    #[test]
    fn bug_without_locations_still_has_message_and_level() {
        let bug = BugInstance {
            group: Some("style".to_string()),
            severity: Some("style".to_string()),
            ..BugInstance::default()
        };
        let value = serde_json::to_value(to_result(&bug, &base_ids(), &mut ArtifactRegistry::default()))
            .expect("serialize");
        assert_eq!(value["ruleId"], "style");
        assert_eq!(value["level"], "note");
        assert_eq!(value["message"]["text"], "");
        assert_eq!(value.get("locations"), None);
    }

    #[test]
    fn level_mapping_defaults_to_warning() {
        assert_eq!(level_for(Some("HIGH")), "error");
        assert_eq!(level_for(Some("medium")), "warning");
        assert_eq!(level_for(Some("portability")), "note");
        assert_eq!(level_for(None), "warning");
    }

    #[test]
    fn invocation_paths_are_base_relative() {
        let record = InvocationRecord {
            artifact_id: "1".to_string(),
            executable: Some("./build.sh".to_string()),
            args: vec!["./build.sh".to_string(), "all".to_string()],
            command_line: "./build.sh all".to_string(),
            cwd: Some("/tmp/build/pkg".to_string()),
            start_ts: Some("0".to_string()),
            exit_code: Some(2),
            environment: BTreeMap::from([("CC".to_string(), "gcc".to_string())]),
            assessment_report: Some("/tmp/results/r.xml".to_string()),
            ..InvocationRecord::default()
        };
        let value: Value =
            serde_json::to_value(to_invocation(&record, &base_ids())).expect("serialize");
        assert_eq!(value["commandLine"], "./build.sh all");
        assert_eq!(
            value["workingDirectory"],
            json!({"uri": "./", "uriBaseId": "PACKAGEROOT"})
        );
        assert_eq!(
            value["executableLocation"],
            json!({"uri": "build.sh", "uriBaseId": "PACKAGEROOT"})
        );
        assert_eq!(value["environmentVariables"]["CC"], "gcc");
        assert_eq!(value["startTimeUtc"], "1970-01-01T00:00:00.000Z");
        assert_eq!(value["exitCode"], 2);
        assert_eq!(value["executionSuccessful"], false);
        assert_eq!(value["properties"]["buildArtifactId"], "1");
        assert_eq!(
            value["properties"]["assessmentReport"],
            json!({"uri": "r.xml", "uriBaseId": "RESULTSROOT"})
        );
    }
}
