//! Credential hashing.
//!
//! Stored form: `b3$<salt hex>$<digest hex>`, digest = BLAKE3 derive-key
//! over `salt || password`.  Verification compares digests in constant time.

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{CREDENTIAL_SALT_SIZE, KDF_CONTEXT_CREDENTIAL};

const SCHEME: &str = "b3";

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; CREDENTIAL_SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let digest = digest(&salt, password);
    format!("{SCHEME}${}${}", hex::encode(salt), hex::encode(digest))
}

/// Returns `false` for a wrong password and for any malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(salt_hex), Some(digest_hex), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    let actual = digest(&salt, password);
    expected.len() == actual.len() && actual[..].ct_eq(&expected[..]).unwrap_u8() == 1
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_CREDENTIAL);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}
