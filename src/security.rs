use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::errors::{ErpError, ServiceResult};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password for storage (Argon2id).
pub fn hash_password(password: &str) -> ServiceResult<String> {
    if password.trim().len() < MIN_PASSWORD_LEN {
        return Err(ErpError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ErpError::Internal(format!("hash_password failed: {e}")))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Random one-time password handed to a newly approved student.
pub fn generate_temp_password() -> String {
    let mut bytes = [0u8; 9];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
