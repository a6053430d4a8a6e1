use crate::constants::limits::{MAX_PORT, MIN_PORT};
use crate::errors::SshError;
use base64::Engine;
use serde_json::Value;

/// Argument coercion for façade calls. Failures are `Parameter` faults raised
/// before any network activity.
#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &Value, label: &str, trim: bool) -> Result<String, SshError> {
        let text = value.as_str().ok_or_else(|| {
            SshError::parameter(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(SshError::parameter(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, SshError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    pub fn ensure_port(&self, value: Option<&Value>, fallback: u16) -> Result<u16, SshError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(fallback);
        };
        let numeric = coerce_i64(value).ok_or_else(|| {
            SshError::parameter(format!(
                "port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            ))
        })?;
        if numeric < MIN_PORT as i64 || numeric > MAX_PORT as i64 {
            return Err(SshError::parameter_range(format!(
                "port must be an integer between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }
        Ok(numeric as u16)
    }

    /// Timeout in milliseconds; negative means wait forever.
    pub fn ensure_timeout(&self, value: Option<&Value>, fallback: i64) -> Result<i64, SshError> {
        match value.filter(|v| !v.is_null()) {
            None => Ok(fallback),
            Some(v) => coerce_i64(v)
                .ok_or_else(|| SshError::parameter("timeout_ms must be an integer")),
        }
    }

    pub fn ensure_stream_id(&self, value: Option<&Value>) -> Result<i32, SshError> {
        match value.filter(|v| !v.is_null()) {
            None => Ok(0),
            Some(v) => match coerce_i64(v) {
                Some(id @ 0..=1) => Ok(id as i32),
                Some(_) => Err(SshError::parameter_range(
                    "stream_id must be 0 (primary) or 1 (extended)",
                )),
                None => Err(SshError::parameter("stream_id must be an integer")),
            },
        }
    }

    pub fn ensure_mode(&self, value: Option<&Value>, label: &str, fallback: i32) -> Result<i32, SshError> {
        match value.filter(|v| !v.is_null()) {
            None => Ok(fallback),
            Some(v) => {
                let numeric = match v.as_str() {
                    Some(text) => i64::from_str_radix(text.trim().trim_start_matches("0o"), 8).ok(),
                    None => v.as_i64(),
                };
                match numeric {
                    Some(mode) if (0..=0o7777).contains(&mode) => Ok(mode as i32),
                    Some(_) => Err(SshError::parameter_range(format!(
                        "{} must be between 0 and 0o7777",
                        label
                    ))),
                    None => Err(SshError::parameter(format!(
                        "{} must be an integer or an octal string",
                        label
                    ))),
                }
            }
        }
    }

    pub fn ensure_size(&self, value: Option<&Value>, label: &str) -> Result<usize, SshError> {
        let value = value
            .filter(|v| !v.is_null())
            .ok_or_else(|| SshError::parameter(format!("{} is required", label)))?;
        match coerce_i64(value) {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(_) => Err(SshError::parameter_range(format!(
                "{} must not be negative",
                label
            ))),
            None => Err(SshError::parameter(format!("{} must be an integer", label))),
        }
    }

    pub fn ensure_bool(&self, value: Option<&Value>, fallback: bool) -> bool {
        value.and_then(Value::as_bool).unwrap_or(fallback)
    }

    /// Binary payloads travel as `data` (text) or `data_base64`.
    pub fn ensure_payload(&self, args: &Value) -> Result<Vec<u8>, SshError> {
        if let Some(encoded) = args.get("data_base64").and_then(Value::as_str) {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|err| SshError::parameter(format!("data_base64 is not valid base64: {}", err)));
        }
        match args.get("data") {
            Some(Value::String(text)) => Ok(text.as_bytes().to_vec()),
            Some(Value::Null) | None => Err(SshError::parameter("data or data_base64 is required")),
            Some(_) => Err(SshError::parameter("data must be a string")),
        }
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
}
