use super::{
    blocking, encode_base64, handle_base_method, method_name, session_from_args,
    unknown_method_error, MethodHandler,
};
use crate::config::ClientConfig;
use crate::errors::SshError;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::sftp::{SftpClient, TransferOptions};
use crate::ssh::TextEncoding;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

pub const SFTP_CLIENT_METHODS: &[&str] = &[
    "connect",
    "disconnect",
    "is_connected",
    "set_user",
    "set_password",
    "set_keys",
    "info",
    "stats",
    "take_warnings",
    "path",
    "list",
    "list_full",
    "stat",
    "chdir",
    "chmod",
    "mkdir",
    "rmdir",
    "rename",
    "remove_file",
    "get_file",
    "get_text_file",
    "retrieve_file",
    "put_file",
    "transfer_file",
    "is_alive",
    "is_alive_ex",
];

pub struct SftpClientObject {
    client: SftpClient,
    validation: Validation,
}

fn to_json(value: impl Serialize) -> Result<Value, SshError> {
    serde_json::to_value(value).map_err(|err| SshError::internal(err.to_string()))
}

impl SftpClientObject {
    pub fn new(client: SftpClient) -> Self {
        Self {
            client,
            validation: Validation::new(),
        }
    }

    pub fn from_args(args: &Value, config: ClientConfig, logger: Logger) -> Result<Self, SshError> {
        let session = session_from_args(args, config, logger)?;
        Ok(Self::new(SftpClient::from_session(session)))
    }

    pub fn client(&self) -> &SftpClient {
        &self.client
    }

    fn timeout(&self, args: &Value) -> Result<i64, SshError> {
        self.validation.ensure_timeout(
            args.get("timeout_ms"),
            self.client.session().config().default_timeout_ms,
        )
    }

    fn path_arg(&self, args: &Value, key: &str) -> Result<String, SshError> {
        self.validation
            .ensure_string(args.get(key).unwrap_or(&Value::Null), key, false)
    }

    fn optional_mode(&self, args: &Value) -> Result<Option<i32>, SshError> {
        match args.get("mode").filter(|v| !v.is_null()) {
            None => Ok(None),
            Some(_) => self.validation.ensure_mode(args.get("mode"), "mode", 0).map(Some),
        }
    }

    fn transfer_options(&self, args: &Value) -> TransferOptions {
        let defaults = TransferOptions::default();
        TransferOptions {
            overwrite: self.validation.ensure_bool(args.get("overwrite"), defaults.overwrite),
            preserve_mtime: self
                .validation
                .ensure_bool(args.get("preserve_mtime"), defaults.preserve_mtime),
        }
    }

    async fn dispatch(&self, method: &str, args: &Value) -> Result<Value, SshError> {
        let client = self.client.clone();
        let timeout_ms = self.timeout(args)?;
        match method {
            "connect" => {
                blocking(move || client.connect(timeout_ms)).await?;
                Ok(json!({"success": true, "connected": true}))
            }
            "info" => to_json(client.info()),
            "path" => {
                let path = blocking(move || client.path(timeout_ms)).await?;
                Ok(json!({"path": path}))
            }
            "list" => {
                let path = self.validation.ensure_optional_string(args.get("path"), "path", false)?;
                to_json(blocking(move || client.list(path.as_deref(), timeout_ms)).await?)
            }
            "list_full" => {
                let path = self.validation.ensure_optional_string(args.get("path"), "path", false)?;
                let entries = blocking(move || client.list_full(path.as_deref(), timeout_ms)).await?;
                Ok(json!({"entries": to_json(entries)?}))
            }
            "stat" => {
                let path = self.path_arg(args, "path")?;
                let attrs = blocking(move || client.stat(&path, timeout_ms)).await?;
                Ok(match attrs {
                    Some(attrs) => json!({
                        "exists": true,
                        "file_type": attrs.file_type(),
                        "permissions": attrs.permission_string(),
                        "attrs": to_json(attrs)?,
                    }),
                    None => json!({"exists": false}),
                })
            }
            "chdir" => {
                let path = self.path_arg(args, "path")?;
                let path = blocking(move || client.chdir(&path, timeout_ms)).await?;
                Ok(json!({"path": path}))
            }
            "chmod" => {
                let path = self.path_arg(args, "path")?;
                let mode = self.validation.ensure_mode(args.get("mode"), "mode", -1)?;
                if mode < 0 {
                    return Err(SshError::parameter("mode is required"));
                }
                blocking(move || client.chmod(&path, mode, timeout_ms)).await?;
                Ok(json!({"success": true}))
            }
            "mkdir" => {
                let path = self.path_arg(args, "path")?;
                let mode = self.optional_mode(args)?;
                blocking(move || client.mkdir(&path, mode, timeout_ms)).await?;
                Ok(json!({"success": true}))
            }
            "rmdir" => {
                let path = self.path_arg(args, "path")?;
                blocking(move || client.rmdir(&path, timeout_ms)).await?;
                Ok(json!({"success": true}))
            }
            "rename" => {
                let from = self.path_arg(args, "from")?;
                let to = self.path_arg(args, "to")?;
                blocking(move || client.rename(&from, &to, timeout_ms)).await?;
                Ok(json!({"success": true}))
            }
            "remove_file" => {
                let path = self.path_arg(args, "path")?;
                blocking(move || client.remove_file(&path, timeout_ms)).await?;
                Ok(json!({"success": true}))
            }
            "get_file" => {
                let path = self.path_arg(args, "path")?;
                let data = blocking(move || client.get_file(&path, timeout_ms)).await?;
                Ok(json!({"data_base64": encode_base64(&data), "bytes": data.len()}))
            }
            "get_text_file" => {
                let path = self.path_arg(args, "path")?;
                let encoding = match self
                    .validation
                    .ensure_optional_string(args.get("encoding"), "encoding", true)?
                {
                    Some(raw) => TextEncoding::parse(&raw)?,
                    None => TextEncoding::default(),
                };
                let text = blocking(move || client.get_text_file(&path, encoding, timeout_ms)).await?;
                Ok(json!({"data": text, "encoding": encoding.label()}))
            }
            "retrieve_file" => {
                let path = self.path_arg(args, "path")?;
                let local = self.path_arg(args, "local_path")?;
                let options = self.transfer_options(args);
                to_json(blocking(move || client.retrieve_file(&path, local, options, timeout_ms)).await?)
            }
            "put_file" => {
                let path = self.path_arg(args, "path")?;
                let mode = self.optional_mode(args)?;
                let data = self.validation.ensure_payload(args)?;
                to_json(blocking(move || client.put_file(&data, &path, mode, timeout_ms)).await?)
            }
            "transfer_file" => {
                let local = self.path_arg(args, "local_path")?;
                let path = self.path_arg(args, "path")?;
                let mode = self.optional_mode(args)?;
                let options = self.transfer_options(args);
                to_json(
                    blocking(move || client.transfer_file(local, &path, mode, options, timeout_ms))
                        .await?,
                )
            }
            "is_alive" => {
                let alive = blocking(move || Ok(client.is_alive(timeout_ms))).await?;
                Ok(json!({"alive": alive}))
            }
            "is_alive_ex" => {
                let alive = blocking(move || client.is_alive_ex(timeout_ms)).await?;
                Ok(json!({"alive": alive}))
            }
            other => Err(unknown_method_error("SFTP", other, SFTP_CLIENT_METHODS)),
        }
    }
}

#[async_trait]
impl MethodHandler for SftpClientObject {
    async fn handle(&self, args: Value) -> Result<Value, SshError> {
        let method = method_name(&args).to_string();
        if let Some(result) = handle_base_method(self.client.session(), &method, &args).await {
            return result;
        }
        self.dispatch(&method, &args).await
    }
}
