//! Path canonicalization
//!
//! Folders and files are addressed by slash-delimited strings. The canonical
//! form has a leading slash, no trailing slash and no surrounding whitespace;
//! the empty path is the root `/`.

/// Path of the root folder
pub const ROOT: &str = "/";

/// Canonicalize a folder path.
pub fn format_dir(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return ROOT.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Split a file path into its canonical parent folder and its leaf name.
pub fn split_file(path: &str) -> (String, String) {
    let path = format_dir(path);
    match path.rfind('/') {
        Some(pos) => (format_dir(&path[..pos]), path[pos + 1..].trim().to_string()),
        None => (ROOT.to_string(), path),
    }
}

/// Canonical parent folder of `path`. The root is its own parent.
pub fn parent_dir(path: &str) -> String {
    split_file(path).0
}

/// Leaf name of `path`, empty for the root.
pub fn leaf(path: &str) -> String {
    split_file(path).1
}

/// Join a folder path and a child name without doubling the root slash.
pub fn join(dir: &str, name: &str) -> String {
    let dir = format_dir(dir);
    let name = name.trim().trim_matches('/');
    if name.is_empty() {
        return dir;
    }
    if dir == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Key prefix matching every strict descendant of `dir`.
pub fn descendants_prefix(dir: &str) -> String {
    let dir = format_dir(dir);
    if dir == ROOT {
        dir
    } else {
        format!("{}/", dir)
    }
}

/// Whether `path` is `ancestor` itself or lies somewhere beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    let path = format_dir(path);
    let ancestor = format_dir(ancestor);
    path == ancestor || path.starts_with(&descendants_prefix(&ancestor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dir() {
        let cases = [
            ("/folderA/folderB/fic.txt/", "/folderA/folderB/fic.txt"),
            ("/folderB/fic.txt", "/folderB/fic.txt"),
            ("/fic.txt     ", "/fic.txt"),
            ("", "/"),
            ("   ", "/"),
            ("///", "/"),
            ("docs", "/docs"),
        ];

        for (tested, expected) in cases {
            assert_eq!(format_dir(tested), expected, "format_dir({tested:?})");
        }
    }

    #[test]
    fn test_split_file() {
        let cases = [
            ("/folderA/folderB/fic.txt/", "/folderA/folderB", "fic.txt"),
            ("/folderB/fic.txt", "/folderB", "fic.txt"),
            ("/fic.txt     ", "/", "fic.txt"),
            ("/", "/", ""),
            ("", "/", ""),
        ];

        for (tested, dir, file) in cases {
            assert_eq!(
                split_file(tested),
                (dir.to_string(), file.to_string()),
                "split_file({tested:?})"
            );
        }
    }

    #[test]
    fn test_parent_and_leaf() {
        assert_eq!(parent_dir("/a/b/c"), "/a/b");
        assert_eq!(parent_dir("/a"), "/");
        assert_eq!(parent_dir("/"), "/");
        assert_eq!(leaf("/a/b/c"), "c");
        assert_eq!(leaf("/"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "docs"), "/docs");
        assert_eq!(join("/docs/", "a.txt"), "/docs/a.txt");
        assert_eq!(join("/docs", ""), "/docs");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(is_within("/anything", "/"));
        assert!(!is_within("/ab", "/a"));
        assert!(!is_within("/a", "/a/b"));
    }
}
