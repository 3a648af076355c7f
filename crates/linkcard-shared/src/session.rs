//! Bearer session tokens.
//!
//! A token is `base64url(owner_id || expires_at || signature)` where both
//! integers are big-endian `i64` and the signature is the server's Ed25519
//! signature over the first 16 bytes.  The server never stores sessions; any
//! token that verifies against its key and has not expired resolves to an
//! owner.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::constants::SIGNATURE_SIZE;
use crate::error::TokenError;
use crate::types::OwnerId;

const CLAIMS_SIZE: usize = 16;

/// Issues and verifies session tokens with one Ed25519 key.
#[derive(Clone)]
pub struct SessionKeys {
    signing_key: SigningKey,
}

impl SessionKeys {
    /// Generate a random key (sessions do not survive a restart).
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Saturates at the latest representable instant instead of overflowing.
    pub fn issue(&self, owner: OwnerId, ttl: Duration) -> String {
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.issue_until(owner, expires_at)
    }

    pub fn issue_until(&self, owner: OwnerId, expires_at: DateTime<Utc>) -> String {
        let claims = encode_claims(owner, expires_at.timestamp());
        let signature = self.signing_key.sign(&claims);

        let mut raw = Vec::with_capacity(CLAIMS_SIZE + SIGNATURE_SIZE);
        raw.extend_from_slice(&claims);
        raw.extend_from_slice(&signature.to_bytes());
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn verify(&self, token: &str) -> Result<OwnerId, TokenError> {
        verify_with_key(token, &self.verifying_key())
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("public", &hex::encode(self.verifying_key().to_bytes()))
            .finish()
    }
}

pub fn verify_with_key(token: &str, key: &VerifyingKey) -> Result<OwnerId, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| TokenError::Malformed)?;
    if raw.len() != CLAIMS_SIZE + SIGNATURE_SIZE {
        return Err(TokenError::Malformed);
    }

    let (claims, sig_bytes) = raw.split_at(CLAIMS_SIZE);
    let signature = Signature::from_slice(sig_bytes).map_err(|_| TokenError::Malformed)?;
    key.verify(claims, &signature)
        .map_err(|_| TokenError::BadSignature)?;

    let (owner, expires_at) = decode_claims(claims);
    if Utc::now().timestamp() > expires_at {
        return Err(TokenError::Expired);
    }
    Ok(owner)
}

fn encode_claims(owner: OwnerId, expires_at: i64) -> [u8; CLAIMS_SIZE] {
    let mut claims = [0u8; CLAIMS_SIZE];
    claims[..8].copy_from_slice(&owner.0.to_be_bytes());
    claims[8..].copy_from_slice(&expires_at.to_be_bytes());
    claims
}

fn decode_claims(claims: &[u8]) -> (OwnerId, i64) {
    let mut owner = [0u8; 8];
    let mut expires = [0u8; 8];
    owner.copy_from_slice(&claims[..8]);
    expires.copy_from_slice(&claims[8..CLAIMS_SIZE]);
    (OwnerId(i64::from_be_bytes(owner)), i64::from_be_bytes(expires))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_valid() {
        let keys = SessionKeys::generate();
        let token = keys.issue(OwnerId(17), Duration::hours(1));
        assert_eq!(keys.verify(&token), Ok(OwnerId(17)));
    }

    #[test]
    fn test_session_token_expired() {
        let keys = SessionKeys::generate();
        let token = keys.issue_until(OwnerId(17), Utc::now() - Duration::minutes(5));
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_session_token_huge_ttl_saturates() {
        let keys = SessionKeys::generate();
        let token = keys.issue(OwnerId(17), Duration::weeks(1_000_000_000));
        assert_eq!(keys.verify(&token), Ok(OwnerId(17)));
    }

    #[test]
    fn test_session_token_wrong_key() {
        let keys = SessionKeys::generate();
        let other = SessionKeys::generate();
        let token = keys.issue(OwnerId(17), Duration::hours(1));
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_session_token_tampered_owner() {
        let keys = SessionKeys::generate();
        let token = keys.issue(OwnerId(1), Duration::hours(1));
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[7] = 2;
        let forged = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(keys.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_session_token_garbage() {
        let keys = SessionKeys::generate();
        assert_eq!(keys.verify("not a token"), Err(TokenError::Malformed));
        assert_eq!(keys.verify("AAAA"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_seeded_keys_are_stable() {
        let a = SessionKeys::from_seed(&[7u8; 32]);
        let b = SessionKeys::from_seed(&[7u8; 32]);
        let token = a.issue(OwnerId(3), Duration::hours(1));
        assert_eq!(b.verify(&token), Ok(OwnerId(3)));
    }
}
