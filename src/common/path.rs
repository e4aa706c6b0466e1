//! Slash-separated import path helpers. Import paths are not file system
//! paths, so these never touch the disk.

/// The last element of an import path, `"."` for an empty path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() {
        return ".";
    }

    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// The directory part of a file path, `"."` when the path has no directory.
pub fn dir_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => ".",
    }
}

/// The name given to a package that is created for `path`.
pub fn package_name_for_path(path: &str) -> &str {
    let name = base_name(path);
    if path.is_empty() || name == "." {
        "main"
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_of_import_paths() {
        assert_eq!(base_name("fmt"), "fmt");
        assert_eq!(base_name("encoding/json"), "json");
        assert_eq!(base_name("a/b/"), "b");
        assert_eq!(base_name(""), ".");
    }

    #[test]
    fn dir_name_of_file_paths() {
        assert_eq!(dir_name("src/app/main.go"), "src/app");
        assert_eq!(dir_name("main.go"), ".");
        assert_eq!(dir_name("/main.go"), "/");
    }

    #[test]
    fn package_name_defaults_to_main() {
        assert_eq!(package_name_for_path(""), "main");
        assert_eq!(package_name_for_path("."), "main");
        assert_eq!(package_name_for_path("github.com/x/repl"), "repl");
    }
}
