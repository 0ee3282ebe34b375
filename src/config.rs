use crate::error::{ConvertError, Result};
use crate::types::config::ConverterConfig;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

pub const DEFAULT_GLOBAL_CONFIG_FILE: &str = ".config/scarf-to-sarif/config.toml";

/// Load the global config (if any) overlaid with `explicit`. A missing
/// global file is fine; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<ConverterConfig> {
    let global = std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(DEFAULT_GLOBAL_CONFIG_FILE));
    load_config_with_global(explicit, global.as_deref())
}

pub(crate) fn load_config_with_global(
    explicit: Option<&Path>,
    global_path: Option<&Path>,
) -> Result<ConverterConfig> {
    if let Some(path) = explicit.filter(|path| !path.exists()) {
        return Err(ConvertError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let global = global_path.filter(|path| path.exists());

    let mut merged = Table::new();
    for path in global.into_iter().chain(explicit) {
        overlay(&mut merged, parse_layer(path)?);
    }
    Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConvertError::Config(e.to_string()))
}

fn parse_layer(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| ConvertError::Config(format!("{}: {e}", path.display())))
}

/// Keys of `layer` win; nested tables are merged key by key.
fn overlay(base: &mut Table, layer: Table) {
    for (key, value) in layer {
        match value {
            Value::Table(nested) => match base.get_mut(&key) {
                Some(Value::Table(inner)) => overlay(inner, nested),
                _ => {
                    base.insert(key, Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashes::DuplicatePolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_any_file() {
        let cfg = load_config_with_global(None, None).expect("load should not fail");
        assert!(cfg.output.pretty);
        assert_eq!(cfg.hashes.duplicates, DuplicatePolicy::Reject);
        assert_eq!(cfg.hashes.algorithm, "sha-256");
        assert!(cfg.environment.allow_list().contains(&"PATH".to_string()));
    }

    #[test]
    fn explicit_config_overrides_global_per_key() {
        let dir = TempDir::new().expect("temp dir should be created");
        let global = dir.path().join("global.toml");
        let explicit = dir.path().join("local.toml");

        fs::write(
            &global,
            r#"
[output]
pretty = false

[hashes]
algorithm = "md5"
duplicates = "overwrite"
"#,
        )
        .expect("global config should write");
        fs::write(
            &explicit,
            r#"
[hashes]
duplicates = "reject"

[environment]
allow = ["PATH", "CC"]
"#,
        )
        .expect("explicit config should write");

        let cfg = load_config_with_global(Some(&explicit), Some(&global)).expect("merged config");
        assert!(!cfg.output.pretty);
        assert_eq!(cfg.hashes.algorithm, "md5");
        assert_eq!(cfg.hashes.duplicates, DuplicatePolicy::Reject);
        assert_eq!(cfg.environment.allow_list(), vec!["PATH", "CC"]);
    }

    #[test]
    fn later_layer_replaces_arrays() {
        let dir = TempDir::new().expect("temp dir should be created");
        let global = dir.path().join("global.toml");
        let explicit = dir.path().join("local.toml");
        fs::write(&global, "[environment]\nallow = [\"HOME\"]\n").expect("global config should write");
        fs::write(&explicit, "[environment]\nallow = [\"TZ\"]\n").expect("explicit config should write");

        let cfg = load_config_with_global(Some(&explicit), Some(&global)).expect("merged config");
        assert_eq!(cfg.environment.allow_list(), vec!["TZ"]);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = TempDir::new().expect("temp dir should be created");
        let err = load_config_with_global(Some(&dir.path().join("nope.toml")), None)
            .expect_err("explicit file must exist");
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn unknown_duplicate_policy_is_rejected() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[hashes]\nduplicates = \"sometimes\"\n").expect("config should write");
        let err = load_config_with_global(Some(&path), None).expect_err("invalid policy");
        assert!(matches!(err, ConvertError::Config(_)));
    }
}
