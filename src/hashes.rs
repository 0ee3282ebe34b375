use crate::error::{ConvertError, Result};
use crate::paths;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Overwrite,
}

/// File path to content hash, as listed by a `sha256sum`-style file.
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    entries: HashMap<String, String>,
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\S+)\s+(.+)$").expect("hash line pattern is valid"))
}

impl HashTable {
    pub fn load(path: &Path, policy: DuplicatePolicy) -> Result<Self> {
        let file = File::open(path)?;
        let table = Self::parse(BufReader::new(file), &path.display().to_string(), policy)?;
        debug!(entries = table.len(), file = %path.display(), "loaded hash list");
        Ok(table)
    }

    /// Parse `<hash><whitespace><path>` lines. Nothing is returned unless
    /// every line is well formed.
    pub fn parse<R: BufRead>(reader: R, source: &str, policy: DuplicatePolicy) -> Result<Self> {
        let mut entries = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            let Some(caps) = line_pattern().captures(line) else {
                return Err(ConvertError::malformed(
                    source,
                    format!("line {}: expected '<hash> <path>'", idx + 1),
                ));
            };
            let hash = caps[1].to_string();
            let raw_path = &caps[2];
            let key = paths::normalize(raw_path.strip_prefix('*').unwrap_or(raw_path));

            if entries.contains_key(&key) && policy == DuplicatePolicy::Reject {
                return Err(ConvertError::malformed(
                    source,
                    format!("line {}: duplicate path '{key}'", idx + 1),
                ));
            }
            entries.insert(key, hash);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(&paths::normalize(path)).map(String::as_str)
    }

    /// Find the hash of an artifact whose path is relative to `build_root`,
    /// accepting lists written with either relative or absolute paths.
    pub fn lookup(&self, build_root: &str, path: &str) -> Option<&str> {
        self.get(path)
            .or_else(|| self.get(&paths::rebase(".", build_root, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn parse(input: &str, policy: DuplicatePolicy) -> Result<HashTable> {
        HashTable::parse(Cursor::new(input), "hashes.txt", policy)
    }

    #[test]
    fn parses_two_column_lines() {
        let table = parse(
            "aaa  pkg/src/a.c\nbbb\tpkg/src/b c.c\nccc *pkg/bin.o\n",
            DuplicatePolicy::Reject,
        )
        .expect("well formed");
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("pkg/src/a.c"), Some("aaa"));
        assert_eq!(table.get("pkg/src/b c.c"), Some("bbb"));
        assert_eq!(table.get("./pkg//bin.o"), Some("ccc"));
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = parse("aaa a.c\nbbbnopath\n", DuplicatePolicy::Reject)
            .expect_err("second line is malformed");
        match err {
            ConvertError::MalformedInput { path, reason } => {
                assert_eq!(path, "hashes.txt");
                assert!(reason.contains("line 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_path_rejected_by_default_policy() {
        let err = parse("aaa a.c\nbbb ./a.c\n", DuplicatePolicy::Reject)
            .expect_err("duplicate key");
        assert!(err.to_string().contains("duplicate path 'a.c'"));
    }

    #[test]
    fn duplicate_path_overwrites_under_overwrite_policy() {
        let table = parse("aaa a.c\nbbb a.c\n", DuplicatePolicy::Overwrite).expect("accepted");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a.c"), Some("bbb"));
    }

    #[test]
    fn lookup_accepts_absolute_listing() {
        let table = parse("aaa /tmp/build/pkg/a.c\n", DuplicatePolicy::Reject).expect("parsed");
        assert_eq!(table.lookup("/tmp/build", "pkg/a.c"), Some("aaa"));
        assert_eq!(table.lookup("/tmp/build", "pkg/b.c"), None);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("sha256sums");
        std::fs::write(&path, "abc123  src/x.c\r\n").expect("hash file should write");
        let table = HashTable::load(&path, DuplicatePolicy::Reject).expect("load");
        assert_eq!(table.get("src/x.c"), Some("abc123"));
    }
}
