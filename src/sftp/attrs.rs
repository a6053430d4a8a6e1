use crate::constants::modes::{
    PERMISSION_BITS, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK,
};
use serde::Serialize;
use ssh2::FileStat;

/// Attributes reported by the server. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemoteAttributes {
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Full `st_mode`: file type bits plus permission bits.
    pub mode: Option<u32>,
    pub atime: Option<u64>,
    pub mtime: Option<u64>,
}

impl From<&FileStat> for RemoteAttributes {
    fn from(stat: &FileStat) -> Self {
        Self {
            size: stat.size,
            uid: stat.uid,
            gid: stat.gid,
            mode: stat.perm,
            atime: stat.atime,
            mtime: stat.mtime,
        }
    }
}

impl RemoteAttributes {
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn permissions(&self) -> Option<u32> {
        self.mode.map(|m| m & PERMISSION_BITS)
    }

    pub fn permission_string(&self) -> String {
        permission_string(self.mode)
    }

    /// Bucket used by `list`: anything that is neither a directory nor a
    /// link counts as a file.
    pub fn entry_class(&self) -> EntryClass {
        match self.file_type() {
            FileType::Directory => EntryClass::Directory,
            FileType::Symlink => EntryClass::Link,
            _ => EntryClass::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Socket,
    BlockDevice,
    CharDevice,
    Fifo,
}

impl FileType {
    /// Missing mode bits classify as a regular file.
    pub fn from_mode(mode: Option<u32>) -> Self {
        let Some(mode) = mode else {
            return FileType::File;
        };
        match mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            S_IFSOCK => FileType::Socket,
            S_IFBLK => FileType::BlockDevice,
            S_IFCHR => FileType::CharDevice,
            S_IFIFO => FileType::Fifo,
            S_IFREG => FileType::File,
            _ => FileType::File,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
            FileType::Socket => "socket",
            FileType::BlockDevice => "block-device",
            FileType::CharDevice => "char-device",
            FileType::Fifo => "fifo",
        }
    }

    fn ls_char(self) -> char {
        match self {
            FileType::File => '-',
            FileType::Directory => 'd',
            FileType::Symlink => 'l',
            FileType::Socket => 's',
            FileType::BlockDevice => 'b',
            FileType::CharDevice => 'c',
            FileType::Fifo => 'p',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Directory,
    File,
    Link,
}

/// `ls -l` style string, e.g. `drwxr-xr-x`. Unknown modes render as
/// `?---------`.
pub fn permission_string(mode: Option<u32>) -> String {
    let Some(mode) = mode else {
        return "?---------".to_string();
    };
    let mut out = String::with_capacity(10);
    out.push(FileType::from_mode(Some(mode)).ls_char());
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (r, w, x, special, mark) in triads {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        out.push(match (mode & x != 0, mode & special != 0) {
            (true, true) => mark,
            (false, true) => mark.to_ascii_uppercase(),
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}

/// Replaces the permission bits of `current` with `requested`, keeping the
/// file type and special bits.
pub fn merge_permissions(current: u32, requested: u32) -> u32 {
    (current & !PERMISSION_BITS) | (requested & PERMISSION_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_type_bits() {
        assert_eq!(FileType::from_mode(Some(0o040755)), FileType::Directory);
        assert_eq!(FileType::from_mode(Some(0o120777)), FileType::Symlink);
        assert_eq!(FileType::from_mode(Some(0o100644)), FileType::File);
        assert_eq!(FileType::from_mode(Some(0o010600)), FileType::Fifo);
        assert_eq!(FileType::from_mode(None), FileType::File);
    }

    #[test]
    fn list_buckets() {
        let dir = RemoteAttributes { mode: Some(0o040700), ..Default::default() };
        let link = RemoteAttributes { mode: Some(0o120777), ..Default::default() };
        let sock = RemoteAttributes { mode: Some(0o140755), ..Default::default() };
        assert_eq!(dir.entry_class(), EntryClass::Directory);
        assert_eq!(link.entry_class(), EntryClass::Link);
        assert_eq!(sock.entry_class(), EntryClass::File);
        assert_eq!(RemoteAttributes::default().entry_class(), EntryClass::File);
    }

    #[test]
    fn ls_strings() {
        assert_eq!(permission_string(Some(0o040755)), "drwxr-xr-x");
        assert_eq!(permission_string(Some(0o100644)), "-rw-r--r--");
        assert_eq!(permission_string(Some(0o104755)), "-rwsr-xr-x");
        assert_eq!(permission_string(Some(0o041777)), "drwxrwxrwt");
        assert_eq!(permission_string(Some(0o101644)), "-rw-r--r-T");
        assert_eq!(permission_string(None), "?---------");
    }

    #[test]
    fn chmod_keeps_type_bits() {
        assert_eq!(merge_permissions(0o100644, 0o600), 0o100600);
        assert_eq!(merge_permissions(0o040755, 0o700), 0o040700);
        assert_eq!(merge_permissions(0o104755, 0o750), 0o104750);
    }
}
