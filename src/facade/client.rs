use super::{
    blocking, encode_base64, handle_base_method, method_name, session_from_args,
    unknown_method_error, MethodHandler,
};
use crate::config::ClientConfig;
use crate::constants::modes::DEFAULT_FILE_MODE;
use crate::errors::SshError;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::ssh::{Channel, ExtendedDataMode, PtySize, SshSession, TextEncoding};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const SSH_CLIENT_METHODS: &[&str] = &[
    "connect",
    "disconnect",
    "is_connected",
    "set_user",
    "set_password",
    "set_keys",
    "info",
    "stats",
    "take_warnings",
    "open_session_channel",
    "open_direct_tcpip_channel",
    "scp_get",
    "scp_put",
    "list_channels",
    "read",
    "read_binary",
    "read_block",
    "read_binary_block",
    "write",
    "setenv",
    "request_pty",
    "shell",
    "exec",
    "subsystem",
    "send_eof",
    "wait_eof",
    "wait_closed",
    "eof",
    "exit_status",
    "extended_data",
    "set_encoding",
    "get_encoding",
    "close",
    "release",
];

type SharedChannel = Arc<Mutex<Channel>>;

/// An `SshSession` plus the channels opened through it, addressed by
/// `channel_id`.
pub struct SshClientObject {
    session: SshSession,
    channels: Arc<DashMap<String, SharedChannel>>,
    validation: Validation,
}

impl SshClientObject {
    pub fn new(session: SshSession) -> Self {
        Self {
            session,
            channels: Arc::new(DashMap::new()),
            validation: Validation::new(),
        }
    }

    /// `{url}` or `{host, port, user, password, private_key, public_key}`.
    pub fn from_args(args: &Value, config: ClientConfig, logger: Logger) -> Result<Self, SshError> {
        Ok(Self::new(session_from_args(args, config, logger)?))
    }

    pub fn session(&self) -> &SshSession {
        &self.session
    }

    fn timeout(&self, args: &Value) -> Result<i64, SshError> {
        self.validation
            .ensure_timeout(args.get("timeout_ms"), self.session.config().default_timeout_ms)
    }

    fn register(&self, channel: Channel) -> Value {
        let id = uuid::Uuid::new_v4().to_string();
        let kind = channel.kind();
        self.channels.insert(id.clone(), Arc::new(Mutex::new(channel)));
        json!({"channel_id": id, "kind": kind.as_str()})
    }

    fn channel(&self, args: &Value) -> Result<(String, SharedChannel), SshError> {
        let id = self
            .validation
            .ensure_string(args.get("channel_id").unwrap_or(&Value::Null), "channel_id", true)?;
        let channel = self
            .channels
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                SshError::channel_closed(format!("unknown channel_id: {}", id))
                    .with_hint("Open a channel first, or use list_channels.")
            })?;
        Ok((id, channel))
    }

    /// Runs `work` against a registered channel on the blocking pool.
    async fn on_channel<T, F>(&self, args: &Value, work: F) -> Result<T, SshError>
    where
        F: FnOnce(&mut Channel) -> Result<T, SshError> + Send + 'static,
        T: Send + 'static,
    {
        let (_, channel) = self.channel(args)?;
        blocking(move || {
            let mut guard = channel
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            work(&mut guard)
        })
        .await
    }

    /// Forgets ids whose channel the session already dropped, e.g. after a
    /// timeout tore the connection down. Busy channels are kept.
    fn prune_closed(&self) {
        self.channels.retain(|_, channel| match channel.try_lock() {
            Ok(channel) => channel.is_open(),
            Err(_) => true,
        });
    }

    fn list_channels(&self) -> Value {
        let mut out: Vec<Value> = self
            .channels
            .iter()
            .map(|entry| match entry.value().try_lock() {
                Ok(channel) => json!({
                    "channel_id": entry.key(),
                    "kind": channel.kind().as_str(),
                    "open": channel.is_open(),
                    "encoding": channel.encoding().label(),
                }),
                // An operation is in flight on this channel.
                Err(_) => json!({"channel_id": entry.key(), "busy": true}),
            })
            .collect();
        out.sort_by(|a, b| a["channel_id"].as_str().cmp(&b["channel_id"].as_str()));
        json!({"channels": out})
    }

    async fn dispatch(&self, method: &str, args: &Value) -> Result<Value, SshError> {
        let validation = &self.validation;
        match method {
            "connect" => {
                let timeout_ms = self.timeout(args)?;
                let session = self.session.clone();
                blocking(move || session.connect(timeout_ms)).await?;
                Ok(json!({"success": true, "connected": true}))
            }
            "info" => Ok(serde_json::to_value(self.session.info())
                .map_err(|err| SshError::internal(err.to_string()))?),
            "open_session_channel" => {
                let timeout_ms = self.timeout(args)?;
                let session = self.session.clone();
                let channel = blocking(move || session.open_session_channel(timeout_ms)).await?;
                Ok(self.register(channel))
            }
            "open_direct_tcpip_channel" => {
                let host = validation.ensure_string(args.get("host").unwrap_or(&Value::Null), "host", true)?;
                let port = validation.ensure_port(args.get("port"), 0)?;
                if port == 0 {
                    return Err(SshError::parameter("port is required"));
                }
                let source_host = validation.ensure_optional_string(args.get("source_host"), "source_host", true)?;
                let source_port = validation.ensure_port(args.get("source_port"), 22)?;
                let timeout_ms = self.timeout(args)?;
                let session = self.session.clone();
                let channel = blocking(move || {
                    let source = source_host.as_deref().map(|h| (h, source_port));
                    session.open_direct_tcpip_channel(&host, port, source, timeout_ms)
                })
                .await?;
                Ok(self.register(channel))
            }
            "scp_get" => {
                let path = validation.ensure_string(args.get("path").unwrap_or(&Value::Null), "path", true)?;
                let timeout_ms = self.timeout(args)?;
                let session = self.session.clone();
                let (channel, stat) = blocking(move || session.scp_get(&path, timeout_ms)).await?;
                let mut out = self.register(channel);
                out["size"] = json!(stat.size);
                out["mode"] = json!(stat.mode);
                Ok(out)
            }
            "scp_put" => {
                let path = validation.ensure_string(args.get("path").unwrap_or(&Value::Null), "path", true)?;
                let mode = validation.ensure_mode(args.get("mode"), "mode", DEFAULT_FILE_MODE)?;
                let size = validation.ensure_size(args.get("size"), "size")? as u64;
                let timeout_ms = self.timeout(args)?;
                let session = self.session.clone();
                let channel =
                    blocking(move || session.scp_put(&path, mode, size, None, timeout_ms)).await?;
                Ok(self.register(channel))
            }
            "list_channels" => Ok(self.list_channels()),
            "read" | "read_binary" => {
                let stream = validation.ensure_stream_id(args.get("stream_id"))?;
                let timeout_ms = self.timeout(args)?;
                let text = method == "read";
                self.on_channel(args, move |channel| {
                    let bytes = channel.read(stream, timeout_ms)?;
                    Ok(read_result(channel, &bytes, text))
                })
                .await
            }
            "read_block" | "read_binary_block" => {
                let size = validation.ensure_size(args.get("size"), "size")?;
                let stream = validation.ensure_stream_id(args.get("stream_id"))?;
                let timeout_ms = self.timeout(args)?;
                let text = method == "read_block";
                self.on_channel(args, move |channel| {
                    let bytes = channel.read_block(size, stream, timeout_ms)?;
                    Ok(read_result(channel, &bytes, text))
                })
                .await
            }
            "write" => {
                let stream = validation.ensure_stream_id(args.get("stream_id"))?;
                let timeout_ms = self.timeout(args)?;
                let binary = args.get("data_base64").is_some();
                let payload = validation.ensure_payload(args)?;
                let text = if binary {
                    None
                } else {
                    Some(validation.ensure_string(args.get("data").unwrap_or(&Value::Null), "data", false)?)
                };
                self.on_channel(args, move |channel| {
                    let written = match text {
                        Some(text) => {
                            channel.write_text(&text, stream, timeout_ms)?;
                            channel.encoding().encode(&text)?.len()
                        }
                        None => {
                            channel.write(&payload, stream, timeout_ms)?;
                            payload.len()
                        }
                    };
                    Ok(json!({"success": true, "bytes": written}))
                })
                .await
            }
            "setenv" => {
                let name = validation.ensure_string(args.get("name").unwrap_or(&Value::Null), "name", true)?;
                let value = validation.ensure_string(args.get("value").unwrap_or(&Value::Null), "value", false)?;
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.setenv(&name, &value, timeout_ms))
                    .await
                    .map(|()| success())
            }
            "request_pty" => {
                let term = validation
                    .ensure_optional_string(args.get("term"), "term", true)?
                    .unwrap_or_else(|| "vanilla".to_string());
                let defaults = PtySize::default();
                let size = PtySize {
                    cols: dimension(args.get("cols"), "cols", defaults.cols)?,
                    rows: dimension(args.get("rows"), "rows", defaults.rows)?,
                };
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.request_pty(&term, size, timeout_ms))
                    .await
                    .map(|()| success())
            }
            "shell" => {
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.shell(timeout_ms))
                    .await
                    .map(|()| success())
            }
            "exec" => {
                let command =
                    validation.ensure_string(args.get("command").unwrap_or(&Value::Null), "command", false)?;
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.exec(&command, timeout_ms))
                    .await
                    .map(|()| success())
            }
            "subsystem" => {
                let name = validation.ensure_string(args.get("name").unwrap_or(&Value::Null), "name", true)?;
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.subsystem(&name, timeout_ms))
                    .await
                    .map(|()| success())
            }
            "send_eof" => {
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.send_eof(timeout_ms))
                    .await
                    .map(|()| success())
            }
            "wait_eof" => {
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.wait_eof(timeout_ms))
                    .await
                    .map(|()| success())
            }
            "wait_closed" => {
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.wait_closed(timeout_ms))
                    .await
                    .map(|()| success())
            }
            "eof" => self
                .on_channel(args, |channel| channel.eof())
                .await
                .map(|eof| json!({"eof": eof})),
            "exit_status" => self
                .on_channel(args, |channel| channel.exit_status())
                .await
                .map(|status| json!({"exit_status": status})),
            "extended_data" => {
                let raw = validation.ensure_string(args.get("mode").unwrap_or(&Value::Null), "mode", true)?;
                let mode = ExtendedDataMode::parse(&raw).ok_or_else(|| {
                    SshError::parameter(format!("unknown extended data mode '{}'", raw))
                        .with_hint("Use one of: normal, merge, ignore.")
                })?;
                let timeout_ms = self.timeout(args)?;
                self.on_channel(args, move |channel| channel.set_extended_data(mode, timeout_ms))
                    .await
                    .map(|()| success())
            }
            "set_encoding" => {
                let raw = validation.ensure_string(args.get("encoding").unwrap_or(&Value::Null), "encoding", true)?;
                let encoding = TextEncoding::parse(&raw)?;
                self.on_channel(args, move |channel| {
                    channel.set_encoding(encoding);
                    Ok(json!({"encoding": encoding.label()}))
                })
                .await
            }
            "get_encoding" => self
                .on_channel(args, |channel| Ok(json!({"encoding": channel.encoding().label()})))
                .await,
            "close" => {
                let timeout_ms = self.timeout(args)?;
                let (id, channel) = self.channel(args)?;
                // The session forgets the channel whatever the outcome, so the
                // id goes too.
                self.channels.remove(&id);
                blocking(move || {
                    let result = channel
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .close(timeout_ms);
                    drop(channel);
                    result
                })
                .await
                .map(|()| success())
            }
            "release" => {
                let (id, _) = self.channel(args)?;
                let removed = self.channels.remove(&id);
                // Dropping the last handle discards the library channel,
                // which may touch the socket.
                blocking(move || {
                    drop(removed);
                    Ok(())
                })
                .await?;
                Ok(json!({"success": true, "released": id}))
            }
            other => Err(unknown_method_error("SSH2", other, SSH_CLIENT_METHODS)),
        }
    }
}

#[async_trait]
impl MethodHandler for SshClientObject {
    async fn handle(&self, args: Value) -> Result<Value, SshError> {
        let method = method_name(&args).to_string();
        if let Some(result) = handle_base_method(&self.session, &method, &args).await {
            if method == "disconnect" && result.is_ok() {
                self.channels.clear();
            }
            return result;
        }
        let result = self.dispatch(&method, &args).await;
        if matches!(&result, Err(err) if err.tears_down_session()) {
            self.prune_closed();
        }
        result
    }
}

fn success() -> Value {
    json!({"success": true})
}

fn read_result(channel: &Channel, bytes: &[u8], text: bool) -> Value {
    if text {
        json!({
            "data": channel.encoding().decode(bytes),
            "bytes": bytes.len(),
            "eof": bytes.is_empty(),
        })
    } else {
        json!({
            "data_base64": encode_base64(bytes),
            "bytes": bytes.len(),
            "eof": bytes.is_empty(),
        })
    }
}

fn dimension(value: Option<&Value>, label: &str, fallback: u32) -> Result<u32, SshError> {
    match value.filter(|v| !v.is_null()) {
        None => Ok(fallback),
        Some(v) => v
            .as_u64()
            .filter(|n| (1..=u64::from(u16::MAX)).contains(n))
            .map(|n| n as u32)
            .ok_or_else(|| SshError::parameter_range(format!("{} must be between 1 and 65535", label))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SshErrorKind;
    use crate::services::logger::LogLevel;
    use crate::ssh::ChannelKind;

    fn object() -> SshClientObject {
        SshClientObject::from_args(
            &json!({"host": "127.0.0.1", "port": 1, "user": "ops"}),
            ClientConfig::default(),
            Logger::capturing("facade-test", LogLevel::Error),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn unknown_method_has_suggestions() {
        let err = object().handle(json!({"method": "exc"})).await.unwrap_err();
        assert_eq!(err.kind, SshErrorKind::Parameter);
        let details = err.details.unwrap();
        assert!(details["did_you_mean"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "exec"));
    }

    #[tokio::test]
    async fn channel_methods_need_a_known_id() {
        let err = object()
            .handle(json!({"method": "read", "channel_id": "nope"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, SshErrorKind::ChannelClosed);
    }

    #[tokio::test]
    async fn opening_a_channel_requires_a_connection() {
        let err = object()
            .handle(json!({"method": "open_session_channel"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, SshErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn info_reports_target() {
        let info = object().handle(json!({"method": "info"})).await.unwrap();
        assert_eq!(info["host"], "127.0.0.1");
        assert_eq!(info["port"], 1);
        assert_eq!(info["user"], "ops");
        assert_eq!(info["connected"], false);
        assert_eq!(info["open_channels"], 0);
    }

    #[tokio::test]
    async fn idle_disconnect_needs_force() {
        let client = object();
        let err = client.handle(json!({"method": "disconnect"})).await.unwrap_err();
        assert_eq!(err.kind, SshErrorKind::NotConnected);
        let out = client
            .handle(json!({"method": "disconnect", "force": true}))
            .await
            .unwrap();
        assert_eq!(out["connected"], false);
    }

    #[test]
    fn pty_dimensions_are_checked() {
        assert_eq!(dimension(None, "cols", 80).unwrap(), 80);
        assert_eq!(dimension(Some(&json!(132)), "cols", 80).unwrap(), 132);
        let err = dimension(Some(&json!(0)), "rows", 24).unwrap_err();
        assert_eq!(err.kind, SshErrorKind::ParameterRange);
    }

    fn orphan(client: &SshClientObject) -> String {
        let channel = Channel::new(7, ChannelKind::Session, Arc::downgrade(client.session.shared()));
        client.register(channel)["channel_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn close_forgets_the_id_whatever_the_outcome() {
        let client = object();
        let id = orphan(&client);
        let err = client
            .handle(json!({"method": "close", "channel_id": id}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, SshErrorKind::ChannelClosed);
        let listed = client.handle(json!({"method": "list_channels"})).await.unwrap();
        assert!(listed["channels"].as_array().unwrap().is_empty());
        let again = client
            .handle(json!({"method": "close", "channel_id": id}))
            .await
            .unwrap_err();
        assert!(again.message.contains("unknown channel_id"));
    }

    #[tokio::test]
    async fn closed_channels_are_pruned() {
        let client = object();
        let id = orphan(&client);
        assert_eq!(client.channels.len(), 1);
        client.prune_closed();
        assert!(!client.channels.contains_key(&id));
    }
}
