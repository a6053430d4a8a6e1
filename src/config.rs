use crate::constants::{buffers, network};
use crate::utils::feature_flags::is_filesystem_denied;

/// Process-wide knobs, read from the environment once per client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied by the façade when a call does not pass one.
    pub default_timeout_ms: i64,
    pub keepalive_secs: u32,
    pub transfer_chunk_bytes: usize,
    pub filesystem_allowed: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: network::TIMEOUT_DEFAULT_MS,
            keepalive_secs: network::KEEPALIVE_INTERVAL_SECS,
            transfer_chunk_bytes: buffers::SFTP_TRANSFER_CHUNK,
            filesystem_allowed: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            default_timeout_ms: resolve_default_timeout_ms(),
            keepalive_secs: resolve_keepalive_secs(),
            transfer_chunk_bytes: resolve_transfer_chunk_bytes(),
            filesystem_allowed: !is_filesystem_denied(),
        }
    }
}

fn resolve_default_timeout_ms() -> i64 {
    std::env::var("SSHLINK_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(network::TIMEOUT_DEFAULT_MS)
}

fn resolve_keepalive_secs() -> u32 {
    std::env::var("SSHLINK_KEEPALIVE_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(network::KEEPALIVE_INTERVAL_SECS)
}

fn resolve_transfer_chunk_bytes() -> usize {
    std::env::var("SSHLINK_TRANSFER_CHUNK_BYTES")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(buffers::SFTP_TRANSFER_CHUNK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.default_timeout_ms, 60_000);
        assert_eq!(config.keepalive_secs, 60);
        assert_eq!(config.transfer_chunk_bytes, 32 * 1024);
        assert!(config.filesystem_allowed);
    }
}
