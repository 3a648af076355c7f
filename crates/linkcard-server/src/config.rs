//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use linkcard_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS, MAX_UPLOAD_SIZE,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./linkcard.db`
    pub database_path: PathBuf,

    /// Directory where uploaded media is stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./uploads`
    pub media_storage_path: PathBuf,

    /// Maximum upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,

    /// Ed25519 seed for signing session tokens (hex-encoded, 64 chars).
    /// Env: `SESSION_SIGNING_KEY`
    /// Default: none (a random key is generated; sessions die on restart).
    pub session_signing_key: Option<[u8; 32]>,

    /// Session lifetime.
    /// Env: `SESSION_TTL_HOURS`
    /// Default: 720 (30 days)
    pub session_ttl: chrono::Duration,

    /// Prefix for media references handed back to clients.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: empty (references are host-relative, `/uploads/<id>`).
    pub public_base_url: String,

    /// Timeout for link-preview fetches.
    /// Env: `PREVIEW_TIMEOUT_SECS`
    /// Default: 5
    pub preview_timeout: Duration,

    /// Whether new accounts can be registered.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Sustained requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: 10
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: 30
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./linkcard.db"),
            media_storage_path: PathBuf::from("./uploads"),
            max_upload_size: MAX_UPLOAD_SIZE,
            session_signing_key: None,
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            public_base_url: String::new(),
            preview_timeout: Duration::from_secs(5),
            registration_open: true,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(hex_key) = lookup("SESSION_SIGNING_KEY") {
            match parse_hex_seed(&hex_key) {
                Ok(seed) => config.session_signing_key = Some(seed),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Invalid SESSION_SIGNING_KEY, using a random per-process key"
                ),
            }
        }

        if let Some(val) = lookup("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(h) if h > MAX_SESSION_TTL_HOURS => {
                    tracing::warn!(
                        value = %val,
                        max = MAX_SESSION_TTL_HOURS,
                        "SESSION_TTL_HOURS too large, capping"
                    );
                    config.session_ttl = chrono::Duration::hours(MAX_SESSION_TTL_HOURS);
                }
                Ok(h) if h > 0 => config.session_ttl = chrono::Duration::hours(h),
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_HOURS, using default"),
            }
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("PREVIEW_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.preview_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid PREVIEW_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n.is_finite() && n > 0.0 => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 1.0 => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte seed.
fn parse_hex_seed(hex_str: &str) -> Result<[u8; 32], String> {
    let hex_str = hex_str.trim();
    if hex_str.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_str.len()));
    }
    let bytes = hex::decode(hex_str).map_err(|e| e.to_string())?;
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.session_signing_key.is_none());
        assert!(config.registration_open);
    }

    #[test]
    fn test_overrides() {
        let key = "ab".repeat(32);
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("SESSION_SIGNING_KEY", key.as_str()),
            ("PUBLIC_BASE_URL", "https://cards.example/"),
            ("REGISTRATION_OPEN", "false"),
            ("SESSION_TTL_HOURS", "2"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.session_signing_key, Some([0xab; 32]));
        assert_eq!(config.public_base_url, "https://cards.example");
        assert!(!config.registration_open);
        assert_eq!(config.session_ttl, chrono::Duration::hours(2));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "nope"),
            ("SESSION_SIGNING_KEY", "abcd"),
            ("MAX_UPLOAD_SIZE", "-1"),
        ]);
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert!(config.session_signing_key.is_none());
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }

    #[test]
    fn test_session_ttl_is_capped() {
        let config = config_from(&[("SESSION_TTL_HOURS", "9223372036854775807")]);
        assert_eq!(
            config.session_ttl,
            chrono::Duration::hours(MAX_SESSION_TTL_HOURS)
        );
    }

    #[test]
    fn test_invalid_tuning_values_keep_defaults() {
        let config = config_from(&[
            ("PREVIEW_TIMEOUT_SECS", "0"),
            ("RATE_LIMIT_PER_SEC", "NaN"),
            ("RATE_LIMIT_BURST", "0.5"),
        ]);
        let defaults = ServerConfig::default();
        assert_eq!(config.preview_timeout, defaults.preview_timeout);
        assert_eq!(config.rate_limit_per_sec, defaults.rate_limit_per_sec);
        assert_eq!(config.rate_limit_burst, defaults.rate_limit_burst);
    }

    #[test]
    fn test_parse_hex_seed() {
        assert_eq!(parse_hex_seed(&"0f".repeat(32)).unwrap(), [0x0f; 32]);
        assert!(parse_hex_seed(&"zz".repeat(32)).is_err());
    }
}
