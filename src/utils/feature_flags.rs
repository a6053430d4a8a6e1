pub fn is_truthy(value: impl AsRef<str>) -> bool {
    matches!(
        value.as_ref().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn is_truthy_any_env(keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| std::env::var(key).ok().map(is_truthy).unwrap_or(false))
}

/// Local filesystem access (key-file checks, local transfers) is on unless
/// the embedding process opts out.
pub fn is_filesystem_denied() -> bool {
    is_truthy_any_env(&["SSHLINK_NO_FILESYSTEM"])
}
