/// Percent-encode the characters of a filesystem path that would change
/// its meaning inside a URI reference.
///
/// `%`, `?` and `#` are encoded everywhere. A colon is only encoded in the
/// first segment (before any `/`), where it would otherwise be read as a
/// scheme separator.
pub fn encode(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            '?' => encoded.push_str("%3f"),
            '#' => encoded.push_str("%23"),
            _ => encoded.push(ch),
        }
    }

    let (head, rest) = match encoded.find('/') {
        Some(idx) => encoded.split_at(idx),
        None => (encoded.as_str(), ""),
    };
    if head.contains(':') {
        format!("{}{}", head.replace(':', "%3a"), rest)
    } else {
        encoded
    }
}

/// `file://` URI for an absolute path; relative paths are only encoded.
pub fn file_uri(path: &str) -> String {
    if path.starts_with('/') {
        format!("file://{}", encode(path))
    } else {
        encode(path)
    }
}

/// URI of a directory, with the trailing slash SARIF requires on base ids.
pub fn dir_uri(uri: &str) -> String {
    if uri.is_empty() || uri == "." {
        "./".to_string()
    } else if uri.ends_with('/') {
        uri.to_string()
    } else {
        format!("{uri}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_reserved_characters_everywhere() {
        assert_eq!(encode("a#b"), "a%23b");
        assert_eq!(encode("dir/100%/x?y"), "dir/100%25/x%3fy");
    }

    #[test]
    fn encodes_colons_only_in_scheme_like_prefix() {
        assert_eq!(encode("seg:/rest"), "seg%3a/rest");
        assert_eq!(encode("c:file"), "c%3afile");
        assert_eq!(encode("a/b:c"), "a/b:c");
        assert_eq!(encode("x:y/z:w"), "x%3ay/z:w");
    }

    #[test]
    fn leaves_plain_paths_alone() {
        assert_eq!(encode("src/main.c"), "src/main.c");
        assert_eq!(encode("/abs/path with space"), "/abs/path with space");
    }

    #[test]
    fn file_uri_only_for_absolute_paths() {
        assert_eq!(file_uri("/tmp/build"), "file:///tmp/build");
        assert_eq!(file_uri("/tmp/a#1"), "file:///tmp/a%231");
        assert_eq!(file_uri("pkg"), "pkg");
    }

    #[test]
    fn dir_uri_appends_single_slash() {
        assert_eq!(dir_uri("file:///tmp/build"), "file:///tmp/build/");
        assert_eq!(dir_uri("pkg/"), "pkg/");
        assert_eq!(dir_uri("."), "./");
    }
}
