//! JSON method dispatch over the blocking client types.
//!
//! Each object takes `{"method": "...", ...args}` and answers with a JSON
//! value or an `SshError`. Blocking work runs on the tokio blocking pool.

mod client;
mod sftp;

pub use client::{SshClientObject, SSH_CLIENT_METHODS};
pub use sftp::{SftpClientObject, SFTP_CLIENT_METHODS};

use crate::config::ClientConfig;
use crate::errors::SshError;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::ssh::{parse_session_url, SshSession};
use crate::utils::suggest::suggest;
use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, SshError>;
}

pub(crate) fn method_name(args: &Value) -> &str {
    args.get("method").and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn unknown_method_error(object: &str, method: &str, known: &[&str]) -> SshError {
    let suggestions = suggest(method, known, 5);
    let mut hint = format!("Use one of: {}.", known.join(", "));
    if !suggestions.is_empty() {
        hint = format!("Did you mean: {}? {}", suggestions.join(", "), hint);
    }
    SshError::parameter(format!("unknown {} method: '{}'", object, method))
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_methods": known,
            "did_you_mean": suggestions,
        }))
}

/// Runs blocking client work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, SshError>
where
    F: FnOnce() -> Result<T, SshError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| SshError::internal(format!("blocking task failed: {}", err)))?
}

pub(crate) fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Builds a session from `{url}` or `{host, port, user, password,
/// private_key, public_key}`.
pub(crate) fn session_from_args(
    args: &Value,
    config: ClientConfig,
    logger: Logger,
) -> Result<SshSession, SshError> {
    let validation = Validation::new();
    let session = match validation.ensure_optional_string(args.get("url"), "url", true)? {
        Some(url) => SshSession::from_parsed(parse_session_url(&url)?, config, logger),
        None => {
            let host = validation.ensure_string(args.get("host").unwrap_or(&Value::Null), "host", true)?;
            let port = validation.ensure_port(args.get("port"), crate::constants::network::SSH_DEFAULT_PORT)?;
            SshSession::with_config(host, port, config, logger)
        }
    };
    if let Some(user) = validation.ensure_optional_string(args.get("user"), "user", true)? {
        session.set_user(&user)?;
    }
    if let Some(password) = validation.ensure_optional_string(args.get("password"), "password", false)? {
        session.set_password(&password)?;
    }
    if let Some(private_key) = validation.ensure_optional_string(args.get("private_key"), "private_key", true)? {
        let public_key = validation.ensure_optional_string(args.get("public_key"), "public_key", true)?;
        session.set_keys(&private_key, public_key.as_deref().map(std::path::Path::new))?;
    }
    Ok(session)
}

/// Handles the credential and lifecycle methods shared by both objects.
/// Returns `None` when `method` is not one of them.
pub(crate) async fn handle_base_method(
    session: &SshSession,
    method: &str,
    args: &Value,
) -> Option<Result<Value, SshError>> {
    let validation = Validation::new();
    let timeout = || validation.ensure_timeout(args.get("timeout_ms"), session.config().default_timeout_ms);
    let result = match method {
        "disconnect" => {
            let force = validation.ensure_bool(args.get("force"), false);
            match timeout() {
                Ok(timeout_ms) => {
                    let session = session.clone();
                    blocking(move || session.disconnect(force, timeout_ms))
                        .await
                        .map(|()| serde_json::json!({"success": true, "connected": false}))
                }
                Err(err) => Err(err),
            }
        }
        "set_user" => validation
            .ensure_string(args.get("user").unwrap_or(&Value::Null), "user", true)
            .and_then(|user| session.set_user(&user))
            .map(|()| serde_json::json!({"success": true})),
        "set_password" => validation
            .ensure_string(args.get("password").unwrap_or(&Value::Null), "password", false)
            .and_then(|password| session.set_password(&password))
            .map(|()| serde_json::json!({"success": true})),
        "set_keys" => validation
            .ensure_string(args.get("private_key").unwrap_or(&Value::Null), "private_key", true)
            .and_then(|private_key| {
                let public_key =
                    validation.ensure_optional_string(args.get("public_key"), "public_key", true)?;
                session.set_keys(&private_key, public_key.as_deref().map(std::path::Path::new))
            })
            .map(|()| serde_json::json!({"success": true})),
        "is_connected" => Ok(serde_json::json!({"connected": session.is_connected()})),
        "stats" => Ok(serde_json::json!({
            "usage": session.stats(),
            "log": session.logger().stats(),
        })),
        "take_warnings" => Ok(serde_json::json!({"warnings": session.take_warnings()})),
        _ => return None,
    };
    Some(result)
}
