//! Streaming SARIF 2.1.0 writer. Calls must follow the log's layout:
//! `begin_file`, `begin_run`, `add_tool_data`, `add_base_id_set`,
//! optionally `add_invocations`, `begin_results`, `add_result`*,
//! `end_results`, `end_run`, `end_file`.

pub mod model;
pub mod stream;
pub mod time;

use crate::error::{ConvertError, Result};
use crate::hashes::HashTable;
use crate::paths::base_ids::BaseIdSet;
use crate::types::invocation::InvocationRecord;
use crate::types::scarf::BugInstance;
use model::{Artifact, ArtifactRegistry, Conversion, Tool};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use stream::JsonStream;
use tracing::debug;

pub const SARIF_VERSION: &str = "2.1.0";
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
pub const EXTERNAL_PROPERTIES_SCHEMA: &str =
    "https://schemastore.azurewebsites.net/schemas/json/sarif-external-property-file-2.1.0.json";

/// Run sections that can be moved out of the log into the sidecar
/// external property file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalSections {
    pub results: bool,
    pub invocations: bool,
    pub artifacts: bool,
    pub conversion: bool,
}

impl ExternalSections {
    /// Parse a comma separated list such as `results,invocations`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut sections = Self::default();
        for name in spec.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            match name {
                "results" => sections.results = true,
                "invocations" => sections.invocations = true,
                "artifacts" => sections.artifacts = true,
                "conversion" => sections.conversion = true,
                other => {
                    return Err(ConvertError::Options(format!(
                        "unknown externalizable section '{other}' (expected results, invocations, artifacts or conversion)"
                    )))
                }
            }
        }
        Ok(sections)
    }

    pub fn any(&self) -> bool {
        self.results || self.invocations || self.artifacts || self.conversion
    }
}

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub pretty: bool,
    pub external: ExternalSections,
    /// `hashes` key for artifact digests, e.g. `sha-256`.
    pub hash_algorithm: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            external: ExternalSections::default(),
            hash_algorithm: "sha-256".to_string(),
        }
    }
}

/// Run-level facts written when the run object opens.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_framework_version: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
}

pub struct EndMetadata<'a> {
    pub conversion: Conversion,
    pub hashes: Option<&'a HashTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    File,
    Run,
    Tool,
    BaseIds,
    Invocations,
    Results,
    ResultsDone,
    RunDone,
    Finished,
}

struct Sidecar<W: Write> {
    stream: JsonStream<W>,
    uri: String,
}

pub struct SarifWriter<W: Write> {
    main: JsonStream<W>,
    sidecar: Option<Sidecar<W>>,
    options: WriterOptions,
    phase: Phase,
    base_ids: Option<BaseIdSet>,
    artifacts: ArtifactRegistry,
    result_count: usize,
    invocation_count: usize,
    invocations_written: bool,
}

impl<W: Write> SarifWriter<W> {
    pub fn new(out: W, options: WriterOptions) -> Self {
        Self {
            main: JsonStream::new(out, options.pretty),
            sidecar: None,
            options,
            phase: Phase::Created,
            base_ids: None,
            artifacts: ArtifactRegistry::default(),
            result_count: 0,
            invocation_count: 0,
            invocations_written: false,
        }
    }

    /// Writer whose externalized sections go to `sidecar`, referenced
    /// from the log as `sidecar_uri`.
    pub fn with_sidecar(out: W, sidecar: W, sidecar_uri: &str, options: WriterOptions) -> Self {
        let pretty = options.pretty;
        let mut writer = Self::new(out, options);
        writer.sidecar = Some(Sidecar {
            stream: JsonStream::new(sidecar, pretty),
            uri: sidecar_uri.to_string(),
        });
        writer
    }

    pub fn begin_file(&mut self) -> Result<()> {
        self.advance("begin_file", &[Phase::Created], Phase::File)?;
        self.main.begin_object(None)?;
        self.main.field("$schema", SARIF_SCHEMA)?;
        self.main.field("version", SARIF_VERSION)?;
        self.main.begin_array(Some("runs"))?;
        if let Some(sidecar) = self.sidecar.as_mut() {
            sidecar.stream.begin_object(None)?;
            sidecar.stream.field("$schema", EXTERNAL_PROPERTIES_SCHEMA)?;
            sidecar.stream.field("version", SARIF_VERSION)?;
        }
        Ok(())
    }

    pub fn begin_run(&mut self, metadata: &RunMetadata) -> Result<()> {
        self.advance("begin_run", &[Phase::File], Phase::Run)?;
        self.main.begin_object(None)?;
        self.main.field("columnKind", "unicodeCodePoints")?;
        self.main.field("properties", metadata)?;
        Ok(())
    }

    pub fn add_tool_data(&mut self, tool: &ToolInfo) -> Result<()> {
        self.advance("add_tool_data", &[Phase::Run], Phase::Tool)?;
        let tool = Tool {
            driver: model::Driver {
                name: tool.name.clone(),
                version: tool.version.clone(),
                information_uri: None,
            },
        };
        self.main.field("tool", &tool)
    }

    pub fn add_base_id_set(&mut self, base_ids: &BaseIdSet) -> Result<()> {
        self.advance("add_base_id_set", &[Phase::Tool], Phase::BaseIds)?;
        self.main.field("originalUriBaseIds", base_ids.entries())?;
        self.base_ids = Some(base_ids.clone());
        Ok(())
    }

    pub fn add_invocations(&mut self, invocations: &[InvocationRecord]) -> Result<()> {
        self.advance("add_invocations", &[Phase::BaseIds], Phase::Invocations)?;
        let base_ids = self.base_ids()?;
        let converted: Vec<_> = invocations
            .iter()
            .map(|record| model::to_invocation(record, base_ids))
            .collect();
        self.invocation_count = converted.len();
        self.invocations_written = true;
        let external = self.options.external.invocations;
        self.stream_for(external).field("invocations", &converted)
    }

    pub fn begin_results(&mut self) -> Result<()> {
        self.advance(
            "begin_results",
            &[Phase::BaseIds, Phase::Invocations],
            Phase::Results,
        )?;
        let external = self.options.external.results;
        self.stream_for(external).begin_array(Some("results"))
    }

    pub fn add_result(&mut self, bug: &BugInstance) -> Result<()> {
        self.expect_phase("add_result", &[Phase::Results])?;
        let base_ids = self
            .base_ids
            .as_ref()
            .ok_or_else(|| ConvertError::Structural("add_result before add_base_id_set".to_string()))?;
        let result = model::to_result(bug, base_ids, &mut self.artifacts);
        let external = self.options.external.results;
        self.stream_for(external).element(&result)?;
        self.result_count += 1;
        Ok(())
    }

    pub fn end_results(&mut self) -> Result<()> {
        self.advance("end_results", &[Phase::Results], Phase::ResultsDone)?;
        let external = self.options.external.results;
        self.stream_for(external).end()?;
        debug!(
            results = self.result_count,
            artifacts = self.artifacts.len(),
            "results written"
        );
        Ok(())
    }

    pub fn end_run(&mut self, metadata: &EndMetadata<'_>) -> Result<()> {
        self.advance("end_run", &[Phase::ResultsDone], Phase::RunDone)?;
        let artifacts = self.artifact_list(metadata.hashes)?;
        let artifact_count = artifacts.len();
        if !artifacts.is_empty() {
            let external = self.options.external.artifacts;
            self.stream_for(external).field("artifacts", &artifacts)?;
        }
        let external = self.options.external.conversion;
        self.stream_for(external).field("conversion", &metadata.conversion)?;

        if let Some(uri) = self.sidecar.as_ref().map(|sidecar| sidecar.uri.clone()) {
            let references = self.external_references(&uri, artifact_count);
            self.main.field("externalPropertyFileReferences", &references)?;
        }
        self.main.end()
    }

    /// Close the log and hand back the main and sidecar writers.
    pub fn end_file(mut self) -> Result<(W, Option<W>)> {
        self.advance("end_file", &[Phase::RunDone], Phase::Finished)?;
        self.main.end()?;
        self.main.end()?;
        let main = self.main.finish()?;
        let sidecar = match self.sidecar {
            Some(mut sidecar) => {
                sidecar.stream.end()?;
                Some(sidecar.stream.finish()?)
            }
            None => None,
        };
        Ok((main, sidecar))
    }

    fn artifact_list(&self, hashes: Option<&HashTable>) -> Result<Vec<Artifact>> {
        let build_root = self.base_ids()?.build_root();
        Ok(self
            .artifacts
            .entries()
            .iter()
            .map(|located| {
                let mut digests = BTreeMap::new();
                if let Some(hash) = hashes.and_then(|table| table.lookup(build_root, &located.path)) {
                    digests.insert(self.options.hash_algorithm.clone(), hash.to_string());
                }
                Artifact {
                    location: located.location.clone(),
                    hashes: digests,
                }
            })
            .collect())
    }

    fn external_references(&self, uri: &str, artifact_count: usize) -> serde_json::Value {
        let external = self.options.external;
        let reference = |count: Option<usize>| match count {
            Some(count) => json!({ "location": { "uri": uri }, "itemCount": count }),
            None => json!({ "location": { "uri": uri } }),
        };
        let mut references = serde_json::Map::new();
        if external.results {
            references.insert("results".into(), json!([reference(Some(self.result_count))]));
        }
        if external.invocations && self.invocations_written {
            references.insert(
                "invocations".into(),
                json!([reference(Some(self.invocation_count))]),
            );
        }
        if external.artifacts && artifact_count > 0 {
            references.insert("artifacts".into(), json!([reference(Some(artifact_count))]));
        }
        if external.conversion {
            references.insert("conversion".into(), reference(None));
        }
        serde_json::Value::Object(references)
    }

    fn stream_for(&mut self, external: bool) -> &mut JsonStream<W> {
        match self.sidecar.as_mut() {
            Some(sidecar) if external => &mut sidecar.stream,
            _ => &mut self.main,
        }
    }

    fn base_ids(&self) -> Result<&BaseIdSet> {
        self.base_ids
            .as_ref()
            .ok_or_else(|| ConvertError::Structural("base id set has not been written".to_string()))
    }

    fn expect_phase(&self, call: &str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ConvertError::Structural(format!(
                "sarif writer: {call} called in phase {:?}",
                self.phase
            )))
        }
    }

    fn advance(&mut self, call: &str, allowed: &[Phase], next: Phase) -> Result<()> {
        self.expect_phase(call, allowed)?;
        self.phase = next;
        Ok(())
    }
}
