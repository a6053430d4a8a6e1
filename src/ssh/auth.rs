use super::retry::retry;
use super::wait::Deadline;
use crate::errors::SshError;
use crate::services::logger::Logger;
use serde::Serialize;
use ssh2::{KeyboardInteractivePrompt, Prompt};
use std::path::PathBuf;

/// Which method authenticated the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    None,
    #[serde(rename = "publickey")]
    PublicKey,
    Password,
    KeyboardInteractive,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::PublicKey => "publickey",
            AuthMethod::Password => "password",
            AuthMethod::KeyboardInteractive => "keyboard-interactive",
        }
    }
}

/// Fixed attempt order; the first method that succeeds wins.
const PRIORITY: [AuthMethod; 3] = [
    AuthMethod::PublicKey,
    AuthMethod::Password,
    AuthMethod::KeyboardInteractive,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: PathBuf,
    pub public_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub keys: Option<KeyPair>,
}

/// The library calls authentication needs; split out so the priority rules
/// can be exercised without a server.
pub trait AuthBackend {
    /// `Ok(None)` when the server already accepted the `none` method.
    fn offered_methods(&mut self, user: &str) -> Result<Option<String>, SshError>;
    fn publickey(&mut self, user: &str, keys: &KeyPair) -> Result<(), SshError>;
    fn password(&mut self, user: &str, password: &str) -> Result<(), SshError>;
    fn keyboard_interactive(&mut self, user: &str, password: &str) -> Result<(), SshError>;
}

/// Answers single-prompt keyboard-interactive challenges with the configured
/// password. Multi-prompt challenges get empty answers and fail on the server.
pub struct PasswordPrompter<'a> {
    password: &'a str,
}

impl<'a> PasswordPrompter<'a> {
    pub fn new(password: &'a str) -> Self {
        Self { password }
    }

    fn answers(&self, prompts: usize) -> Vec<String> {
        if prompts == 1 {
            vec![self.password.to_string()]
        } else {
            vec![String::new(); prompts]
        }
    }
}

impl KeyboardInteractivePrompt for PasswordPrompter<'_> {
    fn prompt<'b>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[Prompt<'b>],
    ) -> Vec<String> {
        self.answers(prompts.len())
    }
}

pub(crate) struct LibraryAuth<'a> {
    session: &'a ssh2::Session,
    deadline: &'a Deadline,
}

impl<'a> LibraryAuth<'a> {
    pub(crate) fn new(session: &'a ssh2::Session, deadline: &'a Deadline) -> Self {
        Self { session, deadline }
    }
}

impl AuthBackend for LibraryAuth<'_> {
    fn offered_methods(&mut self, user: &str) -> Result<Option<String>, SshError> {
        let session = self.session;
        match retry(session, "auth method query", self.deadline, || {
            session.auth_methods(user).map(str::to_string)
        }) {
            Ok(methods) => Ok(Some(methods)),
            Err(_) if session.authenticated() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn publickey(&mut self, user: &str, keys: &KeyPair) -> Result<(), SshError> {
        let session = self.session;
        retry(session, "publickey authentication", self.deadline, || {
            session.userauth_pubkey_file(
                user,
                keys.public_key.as_deref(),
                &keys.private_key,
                None,
            )
        })
    }

    fn password(&mut self, user: &str, password: &str) -> Result<(), SshError> {
        let session = self.session;
        retry(session, "password authentication", self.deadline, || {
            session.userauth_password(user, password)
        })
    }

    fn keyboard_interactive(&mut self, user: &str, password: &str) -> Result<(), SshError> {
        let session = self.session;
        let mut prompter = PasswordPrompter::new(password);
        retry(
            session,
            "keyboard-interactive authentication",
            self.deadline,
            || session.userauth_keyboard_interactive(user, &mut prompter),
        )
    }
}

/// Tries publickey, password and keyboard-interactive in that order, each
/// only when the server offers it and the credential is present. Individual
/// method failures are logged, never surfaced; timeouts and socket failures
/// abort immediately.
pub fn authenticate(
    backend: &mut dyn AuthBackend,
    target: &str,
    user: &str,
    credentials: &Credentials,
    logger: &Logger,
) -> Result<AuthMethod, SshError> {
    let Some(offered) = backend.offered_methods(user)? else {
        return Ok(AuthMethod::None);
    };
    let offered: Vec<&str> = offered.split(',').map(str::trim).collect();
    let mut attempted = Vec::new();

    for method in PRIORITY {
        if !offered.contains(&method.as_str()) {
            continue;
        }
        let result = match (method, &credentials.keys, &credentials.password) {
            (AuthMethod::PublicKey, Some(keys), _) => backend.publickey(user, keys),
            (AuthMethod::Password, _, Some(password)) => backend.password(user, password),
            (AuthMethod::KeyboardInteractive, _, Some(password)) => {
                backend.keyboard_interactive(user, password)
            }
            _ => continue,
        };
        attempted.push(method.as_str());
        match result {
            Ok(()) => {
                logger.debug(
                    "authenticated",
                    Some(&serde_json::json!({"target": target, "method": method.as_str()})),
                );
                return Ok(method);
            }
            Err(err) if err.tears_down_session() => return Err(err),
            Err(err) => logger.warn(
                "authentication method failed",
                Some(&serde_json::json!({
                    "target": target,
                    "method": method.as_str(),
                    "error": err.message,
                })),
            ),
        }
    }

    Err(SshError::auth(format!(
        "{}@{}: no proper authentication method found",
        user, target
    ))
    .with_details(serde_json::json!({
        "offered": offered,
        "attempted": attempted,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SshErrorKind;
    use crate::services::logger::LogLevel;

    #[derive(Default)]
    struct MockServer {
        offered: Option<&'static str>,
        valid_key: bool,
        valid_password: bool,
        timeout_on_publickey: bool,
        calls: Vec<&'static str>,
    }

    impl AuthBackend for MockServer {
        fn offered_methods(&mut self, _user: &str) -> Result<Option<String>, SshError> {
            Ok(self.offered.map(str::to_string))
        }

        fn publickey(&mut self, _user: &str, _keys: &KeyPair) -> Result<(), SshError> {
            self.calls.push("publickey");
            if self.timeout_on_publickey {
                return Err(SshError::timeout("publickey authentication: timed out"));
            }
            if self.valid_key {
                Ok(())
            } else {
                Err(SshError::protocol("publickey rejected"))
            }
        }

        fn password(&mut self, _user: &str, _password: &str) -> Result<(), SshError> {
            self.calls.push("password");
            if self.valid_password {
                Ok(())
            } else {
                Err(SshError::protocol("password rejected"))
            }
        }

        fn keyboard_interactive(&mut self, _user: &str, _password: &str) -> Result<(), SshError> {
            self.calls.push("keyboard-interactive");
            if self.valid_password {
                Ok(())
            } else {
                Err(SshError::protocol("challenge rejected"))
            }
        }
    }

    fn full_credentials() -> Credentials {
        Credentials {
            user: Some("deploy".to_string()),
            password: Some("secret".to_string()),
            keys: Some(KeyPair {
                private_key: PathBuf::from("/keys/id_rsa"),
                public_key: None,
            }),
        }
    }

    fn logger() -> Logger {
        Logger::capturing("auth-test", LogLevel::Debug)
    }

    #[test]
    fn publickey_wins_over_password() {
        let mut server = MockServer {
            offered: Some("publickey,password,keyboard-interactive"),
            valid_key: true,
            valid_password: true,
            ..Default::default()
        };
        let method = authenticate(&mut server, "h:22", "deploy", &full_credentials(), &logger())
            .unwrap();
        assert_eq!(method, AuthMethod::PublicKey);
        assert_eq!(server.calls, vec!["publickey"]);
    }

    #[test]
    fn falls_back_to_password_and_logs_key_failure() {
        let log = logger();
        let mut server = MockServer {
            offered: Some("publickey,password"),
            valid_password: true,
            ..Default::default()
        };
        let method =
            authenticate(&mut server, "h:22", "deploy", &full_credentials(), &log).unwrap();
        assert_eq!(method, AuthMethod::Password);
        assert!(log
            .captured()
            .iter()
            .any(|line| line.contains("publickey rejected")));
    }

    #[test]
    fn keyboard_interactive_uses_password() {
        let mut server = MockServer {
            offered: Some("keyboard-interactive"),
            valid_password: true,
            ..Default::default()
        };
        let method = authenticate(&mut server, "h:22", "deploy", &full_credentials(), &logger())
            .unwrap();
        assert_eq!(method, AuthMethod::KeyboardInteractive);
        assert_eq!(server.calls, vec!["keyboard-interactive"]);
    }

    #[test]
    fn missing_credentials_skip_methods() {
        let mut server = MockServer {
            offered: Some("publickey,password,keyboard-interactive"),
            valid_key: true,
            valid_password: true,
            ..Default::default()
        };
        let creds = Credentials {
            user: Some("deploy".to_string()),
            ..Default::default()
        };
        let err = authenticate(&mut server, "h:22", "deploy", &creds, &logger()).unwrap_err();
        assert_eq!(err.kind, SshErrorKind::Auth);
        assert!(server.calls.is_empty());
        assert!(err.message.contains("no proper authentication method found"));
    }

    #[test]
    fn every_method_failing_is_one_auth_error() {
        let mut server = MockServer {
            offered: Some("publickey,password,keyboard-interactive"),
            ..Default::default()
        };
        let err = authenticate(&mut server, "h:22", "deploy", &full_credentials(), &logger())
            .unwrap_err();
        assert_eq!(err.kind, SshErrorKind::Auth);
        assert_eq!(
            err.details.unwrap()["attempted"],
            serde_json::json!(["publickey", "password", "keyboard-interactive"])
        );
    }

    #[test]
    fn timeout_aborts_instead_of_falling_back() {
        let mut server = MockServer {
            offered: Some("publickey,password"),
            valid_password: true,
            timeout_on_publickey: true,
            ..Default::default()
        };
        let err = authenticate(&mut server, "h:22", "deploy", &full_credentials(), &logger())
            .unwrap_err();
        assert_eq!(err.kind, SshErrorKind::Timeout);
        assert_eq!(server.calls, vec!["publickey"]);
    }

    #[test]
    fn none_method_accepted() {
        let mut server = MockServer::default();
        let method = authenticate(&mut server, "h:22", "deploy", &full_credentials(), &logger())
            .unwrap();
        assert_eq!(method, AuthMethod::None);
    }

    #[test]
    fn prompter_answers_only_single_prompts() {
        let prompter = PasswordPrompter::new("pw");
        assert_eq!(prompter.answers(1), vec!["pw".to_string()]);
        assert_eq!(prompter.answers(2), vec![String::new(), String::new()]);
    }

    #[test]
    fn method_labels() {
        assert_eq!(AuthMethod::KeyboardInteractive.as_str(), "keyboard-interactive");
        assert_eq!(
            serde_json::to_value(AuthMethod::PublicKey).unwrap(),
            serde_json::json!("publickey")
        );
    }
}
