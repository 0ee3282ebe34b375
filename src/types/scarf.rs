/// Run-level metadata carried by the `<AnalyzerReport>` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialData {
    pub tool_name: Option<String>,
    pub tool_version: Option<String>,
    pub uuid: Option<String>,
    pub assessment_start_ts: Option<String>,
    pub build_root_dir: Option<String>,
    pub package_root_dir: Option<String>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub parser_fw_version: Option<String>,
    pub platform_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Method {
    pub id: Option<String>,
    pub primary: bool,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub id: Option<String>,
    pub primary: bool,
    pub source_file: Option<String>,
    pub start_line: Option<u64>,
    pub end_line: Option<u64>,
    pub start_column: Option<u64>,
    pub end_column: Option<u64>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceLocation {
    pub xpath: Option<String>,
    pub start_line: Option<u64>,
    pub end_line: Option<u64>,
}

/// One `<BugInstance>`: a single finding reported by the analysis tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugInstance {
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub methods: Vec<Method>,
    pub locations: Vec<Location>,
    pub cwe_ids: Vec<u32>,
    pub group: Option<String>,
    pub code: Option<String>,
    pub rank: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub resolution_suggestion: Option<String>,
    pub build_id: Option<String>,
    pub assessment_report_file: Option<String>,
    pub instance_location: Option<InstanceLocation>,
}
