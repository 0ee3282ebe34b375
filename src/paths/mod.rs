//! String-level path handling: every path that ends up in the SARIF log
//! goes through [`normalize`] and [`rebase`] first, so no absolute path or
//! redundant `.`/`//` segment reaches the writer.
//!
//! Nothing here touches the filesystem and `..` is left alone.

pub mod base_ids;
pub mod uri;

/// Canonical form of `path`: repeated separators collapsed, `.` segments
/// dropped, no trailing separator (except for the root itself). An empty
/// result becomes `.`.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    match (absolute, segments.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => ".".to_string(),
        (true, false) => format!("/{}", segments.join("/")),
        (false, false) => segments.join("/"),
    }
}

/// Express `path`, taken relative to `current_dir`, relative to `base_dir`.
///
/// A path that does not live under `base_dir` comes back normalized but
/// otherwise untouched. A path equal to `base_dir` becomes `.`.
pub fn rebase(base_dir: &str, current_dir: &str, path: &str) -> String {
    let base_dir = normalize(base_dir);
    let current_dir = normalize(current_dir);
    let mut path = normalize(path);

    if path == "." {
        path = current_dir;
    } else if current_dir != "." && !path.starts_with('/') {
        path = normalize(&format!("{current_dir}/{path}"));
    }

    if base_dir == "." {
        return path;
    }
    if path == base_dir {
        return ".".to_string();
    }
    let prefix = if base_dir == "/" {
        base_dir.clone()
    } else {
        format!("{base_dir}/")
    };
    match path.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Strip the last segment of `dir` and append `name`. `None` when `dir`
/// has no parent segment to strip.
pub fn sibling_dir(dir: &str, name: &str) -> Option<String> {
    let dir = normalize(dir);
    let (parent, last) = dir.rsplit_once('/')?;
    if last.is_empty() || last == ".." {
        return None;
    }
    if parent.is_empty() {
        Some(format!("/{name}"))
    } else {
        Some(format!("{parent}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_redundant_syntax() {
        assert_eq!(normalize("a//b/./c/"), "a/b/c");
        assert_eq!(normalize("./a/b/."), "a/b");
        assert_eq!(normalize("//x///y"), "/x/y");
        assert_eq!(normalize("a/../b"), "a/../b");
    }

    #[test]
    fn normalize_handles_degenerate_inputs() {
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("./"), ".");
        assert_eq!(normalize("/."), "/");
        assert_eq!(normalize("///"), "/");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in [
            "", ".", "/", "a", "a/", "./a", "a/./b", "//a//b//", "/./.", "a/../b", "./.././x/",
            "x y/ z",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn rebase_resolves_dot_against_current_dir() {
        assert_eq!(rebase("/root", "/root/sub", "."), "sub");
    }

    #[test]
    fn rebase_strips_base_from_absolute_path() {
        assert_eq!(rebase("/root", ".", "/root/x/y"), "x/y");
        assert_eq!(rebase("/root/", ".", "/root//x/./y/"), "x/y");
    }

    #[test]
    fn rebase_leaves_paths_outside_base_unchanged() {
        assert_eq!(rebase("/root", ".", "/other/x"), "/other/x");
        assert_eq!(rebase("/root", ".", "/rootless/x"), "/rootless/x");
    }

    #[test]
    fn rebase_prefixes_relative_path_with_current_dir() {
        assert_eq!(rebase("/root", "/root/sub", "src/a.c"), "sub/src/a.c");
        assert_eq!(rebase("/root", "/root/sub", "/abs/a.c"), "/abs/a.c");
        assert_eq!(rebase(".", "/tmp/build", "pkg"), "/tmp/build/pkg");
    }

    #[test]
    fn rebase_of_base_itself_is_dot() {
        assert_eq!(rebase("/root", "/root", "."), ".");
        assert_eq!(rebase("/", ".", "/etc/passwd"), "etc/passwd");
    }

    #[test]
    fn sibling_dir_replaces_last_segment() {
        assert_eq!(sibling_dir("/tmp/build", "results").as_deref(), Some("/tmp/results"));
        assert_eq!(sibling_dir("/tmp/build/", "results").as_deref(), Some("/tmp/results"));
        assert_eq!(sibling_dir("/build", "results").as_deref(), Some("/results"));
        assert_eq!(sibling_dir("work/build", "results").as_deref(), Some("work/results"));
    }

    #[test]
    fn sibling_dir_requires_a_parent_segment() {
        assert_eq!(sibling_dir("build", "results"), None);
        assert_eq!(sibling_dir("/", "results"), None);
        assert_eq!(sibling_dir(".", "results"), None);
    }
}
