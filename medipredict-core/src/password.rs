//! Salted password hashing with PBKDF2-HMAC-SHA256.
//!
//! Hashes are self-describing strings:
//! `pbkdf2-sha256$<iterations>$<salt base64>$<hash base64>`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::error::AccountError;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, AccountError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hash_with_salt(password, &salt, iterations)
}

fn hash_with_salt(password: &str, salt: &[u8], iterations: u32) -> Result<String, AccountError> {
    let iterations = iterations.max(1);
    let derived = pbkdf2_block(password.as_bytes(), salt, iterations)?;
    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived)
    ))
}

/// Check `password` against an encoded hash produced by [`hash_password`].
///
/// Returns `Err(MalformedHash)` when `encoded` is not in the expected format.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, AccountError> {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iters), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AccountError::MalformedHash);
    };
    if scheme != SCHEME {
        return Err(AccountError::MalformedHash);
    }
    let iterations: u32 = iters.parse().map_err(|_| AccountError::MalformedHash)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| AccountError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(hash)
        .map_err(|_| AccountError::MalformedHash)?;
    if expected.len() != HASH_LEN || iterations == 0 {
        return Err(AccountError::MalformedHash);
    }

    let derived = pbkdf2_block(password.as_bytes(), &salt, iterations)?;
    Ok(constant_time_eq(&derived, &expected))
}

/// First (and only) PBKDF2 block; SHA-256 output already covers `HASH_LEN`.
fn pbkdf2_block(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<[u8; HASH_LEN], AccountError> {
    let prf = HmacSha256::new_from_slice(password)
        .map_err(|e| AccountError::Hashing(e.to_string()))?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = [0u8; HASH_LEN];
    u.copy_from_slice(&mac.finalize().into_bytes());
    let mut out = u;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (o, b) in out.iter_mut().zip(u.iter()) {
            *o ^= b;
        }
    }
    Ok(out)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
