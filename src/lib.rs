//! Blocking SSH2 and SFTP client over libssh2.
//!
//! libssh2 runs on a non-blocking socket; every call that would block waits
//! on the socket within a per-operation deadline and retries. `facade`
//! exposes the clients as JSON method objects.

pub mod config;
pub mod constants;
pub mod errors;
pub mod facade;
pub mod services;
pub mod sftp;
pub mod ssh;
pub mod utils;

pub use config::ClientConfig;
pub use errors::{SshError, SshErrorKind};
pub use sftp::{RemoteAttributes, SftpClient};
pub use ssh::{AuthMethod, Channel, SshSession};
