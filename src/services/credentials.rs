//! One-way hashing of the caller-supplied transfer secret.
//!
//! Only the PHC-formatted Argon2id hash is stored; the plaintext never leaves
//! the request that carried it.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::AppError;

const SALT_LEN: usize = 16;

pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("failed to generate salt: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("failed to build salt: {}", e)))?;

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash secret: {}", e)))
}

/// Returns false for a wrong secret and for a malformed stored hash.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_not_plaintext_and_verifies() {
        let hash = hash_secret("hunter2").unwrap();
        assert!(!hash.contains("hunter2"));
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("hunter2", &hash));
        assert!(!verify_secret("hunter3", &hash));
    }

    #[test]
    fn same_secret_hashes_differently() {
        assert_ne!(hash_secret("abcd").unwrap(), hash_secret("abcd").unwrap());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_secret("abcd", "not-a-phc-string"));
    }
}
