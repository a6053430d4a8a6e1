mod sftp_status;
mod ssh_error;

pub use sftp_status::sftp_status_text;
pub use ssh_error::{SshError, SshErrorKind};
