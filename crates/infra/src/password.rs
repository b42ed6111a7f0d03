//! Argon2 password hashes in PHC string form.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use backoffice_auth::StoreError;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| StoreError::Storage(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| StoreError::Storage(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Storage(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// `false` for a mismatch and for an unparsable hash alike.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
