//! PBKDF2-HMAC-SHA256 password hashes in `pbkdf2_sha256$<iterations>$<salt>$<hash>` form.

use crate::error::AppError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use std::num::NonZeroU32;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 12;
const HASH_LEN: usize = digest::SHA256_OUTPUT_LEN;

pub fn hash_password(raw: &str, iterations: u32) -> Result<String, AppError> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| AppError::Internal("password iterations must be positive".into()))?;
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| AppError::Internal("random source unavailable".into()))?;
    let salt = STANDARD.encode(salt);
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iterations, salt.as_bytes(), raw.as_bytes(), &mut hash);
    Ok(format!("{}${}${}${}", ALGORITHM, iterations, salt, STANDARD.encode(hash)))
}

/// False for malformed or foreign-format hashes.
pub fn verify_password(raw: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(hash)) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if algorithm != ALGORITHM {
        return false;
    }
    let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(hash) else {
        return false;
    };
    pbkdf2::verify(pbkdf2::PBKDF2_HMAC_SHA256, iterations, salt.as_bytes(), raw.as_bytes(), &expected).is_ok()
}

pub fn is_hashed(value: &str) -> bool {
    value.starts_with(ALGORITHM) && value.split('$').count() == 4
}
