/// Application name
pub const APP_NAME: &str = "linkcard";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Sort key given to a block created without an explicit `sort`
pub const DEFAULT_SORT_KEY: i64 = 0;

/// Username length bounds (inclusive)
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;

/// Prefix of the fallback username fabricated for an owner without a profile
pub const FALLBACK_USERNAME_PREFIX: &str = "user";

/// Minimum accepted password length in characters
pub const PASSWORD_MIN_LEN: usize = 6;

/// Salt size for credential hashing in bytes
pub const CREDENTIAL_SALT_SIZE: usize = 16;

/// Ed25519 signature size in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Default session lifetime (30 days)
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 720;

/// Upper bound on a configured session lifetime (10 years).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Maximum upload size in bytes (10 MiB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_CREDENTIAL: &str = "linkcard-credential-v1";
