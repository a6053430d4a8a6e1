use std::path::{Path, PathBuf};

pub fn expand_home_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Some(str_path) = path.to_str() {
        if let Some(rest) = str_path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        if str_path == "~" {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home);
            }
        }
    }
    path.to_path_buf()
}

/// Public key path paired with a private key: `<private>.pub`.
pub fn public_key_sibling(private_key: &Path) -> PathBuf {
    let mut raw = private_key.as_os_str().to_os_string();
    raw.push(".pub");
    PathBuf::from(raw)
}

/// Checks that a key file exists and can be opened for reading.
pub fn ensure_readable(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    std::fs::File::open(path).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_sibling_appends_suffix() {
        assert_eq!(
            public_key_sibling(Path::new("/home/u/.ssh/id_ed25519")),
            PathBuf::from("/home/u/.ssh/id_ed25519.pub")
        );
    }

    #[test]
    fn ensure_readable_rejects_missing_and_directories() {
        let dir = std::env::temp_dir();
        assert!(ensure_readable(&dir).is_err());
        let missing = dir.join(format!("sshlink-missing-{}", uuid::Uuid::new_v4()));
        assert!(ensure_readable(&missing).is_err());
    }
}
