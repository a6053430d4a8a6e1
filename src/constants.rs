pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const KEEPALIVE_INTERVAL_SECS: u32 = 60;
    pub const TIMEOUT_DEFAULT_MS: i64 = 60_000;
    pub const DISCONNECT_DESCRIPTION: &str = "Connection closed by client";
}

pub mod limits {
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
    pub const MAX_WARNINGS: usize = 64;
    /// Largest exact-size channel read accepted in one call.
    pub const MAX_READ_BLOCK: usize = 64 * 1024 * 1024;
}

pub mod buffers {
    pub const CHANNEL_READ_CHUNK: usize = 4 * 1024;
    pub const SFTP_TRANSFER_CHUNK: usize = 32 * 1024;
}

/// Raw libssh2 return codes the engine has to recognise.
pub mod libssh2 {
    pub const ERROR_SOCKET_SEND: i32 = -7;
    pub const ERROR_TIMEOUT: i32 = -9;
    pub const ERROR_SOCKET_DISCONNECT: i32 = -13;
    pub const ERROR_FILE: i32 = -16;
    pub const ERROR_EAGAIN: i32 = -37;
    pub const ERROR_SOCKET_RECV: i32 = -43;

    pub const FX_NO_SUCH_FILE: i32 = 2;
}

pub mod modes {
    pub const S_IFMT: u32 = 0o170_000;
    pub const S_IFSOCK: u32 = 0o140_000;
    pub const S_IFLNK: u32 = 0o120_000;
    pub const S_IFREG: u32 = 0o100_000;
    pub const S_IFBLK: u32 = 0o060_000;
    pub const S_IFDIR: u32 = 0o040_000;
    pub const S_IFCHR: u32 = 0o020_000;
    pub const S_IFIFO: u32 = 0o010_000;
    pub const PERMISSION_BITS: u32 = 0o777;
    pub const DEFAULT_DIR_MODE: i32 = 0o755;
    pub const DEFAULT_FILE_MODE: i32 = 0o644;
}
