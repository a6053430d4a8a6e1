use super::sftp_status_text;
use serde::Serialize;
use serde_json::Value;
use ssh2::ErrorCode;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SshErrorKind {
    Parameter,
    ParameterRange,
    NotConnected,
    Connected,
    Connect,
    Socket,
    Auth,
    Key,
    ChannelClosed,
    Timeout,
    Protocol,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SshError {
    pub kind: SshErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Numeric libssh2 error code, when the fault came from the library.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_code: Option<i32>,
    /// SFTP status code (`SSH_FX_*`), when the fault came from the SFTP layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sftp_status: Option<i32>,
}

impl SshError {
    pub fn new(kind: SshErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            lib_code: None,
            sftp_status: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Parameter, "PARAMETER-ERROR", message)
    }

    pub fn parameter_range(message: impl Into<String>) -> Self {
        Self::new(
            SshErrorKind::ParameterRange,
            "PARAMETER-RANGE-ERROR",
            message,
        )
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::NotConnected, "NOT-CONNECTED", message)
    }

    pub fn connected(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Connected, "CONNECTED", message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Connect, "CONNECT-ERROR", message)
    }

    pub fn socket(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Socket, "SOCKET-ERROR", message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Auth, "AUTH-ERROR", message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Key, "KEY-ERROR", message)
    }

    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::ChannelClosed, "CHANNEL-CLOSED", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Protocol, "PROTOCOL-ERROR", message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Io, "IO-ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SshErrorKind::Internal, "INTERNAL", message)
    }

    /// Maps a terminating libssh2 failure into a protocol fault naming `op`.
    pub fn from_ssh2(op: &str, err: &ssh2::Error) -> Self {
        match err.code() {
            ErrorCode::SFTP(status) => {
                let mut out = Self::protocol(format!(
                    "{}: SFTP status {} ({}): {}",
                    op,
                    status,
                    sftp_status_text(status),
                    err.message()
                ));
                out.sftp_status = Some(status);
                out
            }
            ErrorCode::Session(code) => {
                let mut out = Self::protocol(format!(
                    "{}: libssh2 error {}: {}",
                    op,
                    code,
                    err.message()
                ));
                out.lib_code = Some(code);
                out
            }
        }
    }

    /// Timeouts and socket failures leave libssh2 in an unknown state; the
    /// owning session must be torn down when one escapes an operation.
    pub fn tears_down_session(&self) -> bool {
        matches!(self.kind, SshErrorKind::Timeout | SshErrorKind::Io)
    }

    pub fn is_kind(&self, kind: SshErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for SshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for SshError {}

impl From<std::io::Error> for SshError {
    fn from(err: std::io::Error) -> Self {
        SshError::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sftp_errors_carry_status_text() {
        let err = ssh2::Error::new(ErrorCode::SFTP(3), "denied");
        let mapped = SshError::from_ssh2("sftp mkdir /srv/x", &err);
        assert_eq!(mapped.kind, SshErrorKind::Protocol);
        assert_eq!(mapped.sftp_status, Some(3));
        assert!(mapped.message.contains("permission denied"));
        assert!(mapped.message.contains("/srv/x"));
    }

    #[test]
    fn session_errors_carry_library_code() {
        let err = ssh2::Error::new(ErrorCode::Session(-18), "Username/PublicKey combination invalid");
        let mapped = SshError::from_ssh2("auth", &err);
        assert_eq!(mapped.lib_code, Some(-18));
        assert!(mapped.sftp_status.is_none());
        assert!(mapped.to_string().starts_with("PROTOCOL-ERROR: auth"));
    }

    #[test]
    fn only_timeouts_and_io_tear_down() {
        assert!(SshError::timeout("t").tears_down_session());
        assert!(SshError::io("i").tears_down_session());
        assert!(!SshError::protocol("p").tears_down_session());
        assert!(!SshError::channel_closed("c").tears_down_session());
    }
}
