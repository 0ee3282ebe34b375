use crate::hashes::DuplicatePolicy;
use serde::Deserialize;

/// Variables kept in the conversion environment snapshot under
/// `--reduced-env` unless the config names its own list.
pub const DEFAULT_ENV_ALLOW_LIST: &[&str] = &[
    "HOME", "LANG", "LC_ALL", "LOGNAME", "PATH", "PWD", "SHELL", "TERM", "TZ", "USER",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConverterConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub hashes: HashesConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
        }
    }
}

fn default_pretty() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashesConfig {
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Key used for the SARIF `artifact.hashes` entries.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for HashesConfig {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::default(),
            algorithm: default_algorithm(),
        }
    }
}

fn default_algorithm() -> String {
    "sha-256".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    pub allow: Option<Vec<String>>,
}

impl EnvironmentConfig {
    pub fn allow_list(&self) -> Vec<String> {
        match &self.allow {
            Some(names) => names.clone(),
            None => DEFAULT_ENV_ALLOW_LIST
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
