use std::collections::BTreeMap;

/// One past tool run recorded in an assessment summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationRecord {
    pub artifact_id: String,
    pub executable: Option<String>,
    pub args: Vec<String>,
    /// Shell-safe rendering of `args`, filled in when the record is sealed.
    pub command_line: String,
    pub cwd: Option<String>,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    pub exit_code: Option<i32>,
    pub environment: BTreeMap<String, String>,
    pub assessment_report: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentSummary {
    pub package_root_dir: String,
    pub build_root_dir: Option<String>,
    pub uuid: Option<String>,
    pub tool_type: Option<String>,
    pub tool_version: Option<String>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub platform_name: Option<String>,
    pub start_ts: Option<String>,
    pub stop_ts: Option<String>,
    /// In document order.
    pub invocations: Vec<InvocationRecord>,
}
