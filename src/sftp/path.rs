/// Absolute paths pass through, relative ones are appended to `cwd` with a
/// single `/`, and a missing or empty path means `cwd` itself. No `.`/`..`
/// folding: that is left to the server's realpath.
pub fn resolve_path(cwd: &str, path: Option<&str>) -> String {
    match path {
        None | Some("") => cwd.to_string(),
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) => format!("{}/{}", cwd, p),
    }
}

/// Last component of a remote path, ignoring trailing slashes.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_with_one_slash() {
        assert_eq!(resolve_path("/home/u", Some("docs/a.txt")), "/home/u/docs/a.txt");
        assert_eq!(resolve_path("/", Some("etc")), "//etc");
    }

    #[test]
    fn absolute_paths_are_verbatim() {
        assert_eq!(resolve_path("/home/u", Some("/var/log")), "/var/log");
        assert_eq!(resolve_path("/home/u", Some("/a/../b")), "/a/../b");
    }

    #[test]
    fn missing_path_is_cwd() {
        assert_eq!(resolve_path("/home/u", None), "/home/u");
        assert_eq!(resolve_path("/home/u", Some("")), "/home/u");
    }

    #[test]
    fn base_names() {
        assert_eq!(base_name("/srv/data/sub"), "sub");
        assert_eq!(base_name("/srv/data/sub/"), "sub");
        assert_eq!(base_name("file"), "file");
    }
}
