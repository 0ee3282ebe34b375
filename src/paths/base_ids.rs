use super::uri::{dir_uri, encode, file_uri};
use super::{normalize, rebase, sibling_dir};
use crate::error::{ConvertError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

pub const BUILD_ROOT: &str = "BUILDROOT";
pub const PACKAGE_ROOT: &str = "PACKAGEROOT";
pub const RESULTS_ROOT: &str = "RESULTSROOT";

const RESULTS_DIR_NAME: &str = "results";

/// One entry of SARIF `run.originalUriBaseIds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseId {
    pub uri: String,
    #[serde(rename = "uriBaseId", skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_base_id: Option<String>,
}

/// An artifact location together with the path it was derived from,
/// relative to the build root (or absolute when outside of it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub location: ArtifactLocation,
    pub path: String,
}

/// The symbolic directories every emitted URI is expressed against.
/// Computed once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct BaseIdSet {
    entries: BTreeMap<String, BaseId>,
    build_root: String,
    package_root: String,
    results_root: String,
}

impl BaseIdSet {
    /// `package_root` may be absolute or relative to `build_root`.
    pub fn new(build_root: &str, package_root: &str) -> Result<Self> {
        let build_root = normalize(build_root);
        let results_root = sibling_dir(&build_root, RESULTS_DIR_NAME).ok_or_else(|| {
            ConvertError::Structural(format!(
                "build root directory '{build_root}' has no parent to derive the results directory from"
            ))
        })?;
        let package_root = rebase(&build_root, &build_root, package_root);

        let mut entries = BTreeMap::new();
        entries.insert(
            BUILD_ROOT.to_string(),
            BaseId {
                uri: dir_uri(&file_uri(&build_root)),
                parent: None,
            },
        );
        let package_entry = if package_root.starts_with('/') {
            BaseId {
                uri: dir_uri(&file_uri(&package_root)),
                parent: None,
            }
        } else {
            BaseId {
                uri: dir_uri(&encode(&package_root)),
                parent: Some(BUILD_ROOT.to_string()),
            }
        };
        entries.insert(PACKAGE_ROOT.to_string(), package_entry);
        entries.insert(
            RESULTS_ROOT.to_string(),
            BaseId {
                uri: dir_uri(&file_uri(&results_root)),
                parent: None,
            },
        );

        Ok(Self {
            entries,
            build_root,
            package_root,
            results_root,
        })
    }

    pub fn entries(&self) -> &BTreeMap<String, BaseId> {
        &self.entries
    }

    pub fn build_root(&self) -> &str {
        &self.build_root
    }

    pub fn results_root(&self) -> &str {
        &self.results_root
    }

    /// Package root as a plain path (absolute when the build root is).
    pub fn package_root_path(&self) -> String {
        rebase(".", &self.build_root, &self.package_root)
    }

    /// Locate a path found in the SCARF report; relative paths are taken
    /// from the build root.
    pub fn locate(&self, path: &str) -> Located {
        self.locate_from(&self.build_root, path)
    }

    /// Locate `path` interpreted relative to `current_dir`, preferring the
    /// innermost base id that contains it.
    pub fn locate_from(&self, current_dir: &str, path: &str) -> Located {
        let relative = rebase(&self.build_root, current_dir, path);
        let location = if relative.starts_with('/') {
            ArtifactLocation {
                uri: file_uri(&relative),
                uri_base_id: None,
            }
        } else {
            let in_package = if self.package_root.starts_with('/') || self.package_root == "." {
                None
            } else {
                Some(rebase(&self.package_root, ".", &relative)).filter(|p| *p != relative)
            };
            match in_package {
                Some(inner) => relative_location(&inner, PACKAGE_ROOT),
                None => relative_location(&relative, BUILD_ROOT),
            }
        };
        Located {
            location,
            path: relative,
        }
    }

    /// Locate a file produced by the assessment (SCARF `AssessmentReportFile`).
    pub fn locate_result_file(&self, path: &str) -> ArtifactLocation {
        let relative = rebase(&self.results_root, &self.results_root, path);
        if relative.starts_with('/') {
            ArtifactLocation {
                uri: file_uri(&relative),
                uri_base_id: None,
            }
        } else {
            relative_location(&relative, RESULTS_ROOT)
        }
    }
}

fn relative_location(path: &str, base: &str) -> ArtifactLocation {
    let uri = if path == "." {
        "./".to_string()
    } else {
        encode(path)
    };
    ArtifactLocation {
        uri,
        uri_base_id: Some(base.to_string()),
    }
}
