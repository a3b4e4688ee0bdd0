use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};
use std::{
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

use crate::{config::PasswordParams, error::AppError};

/// hash_password
///
/// Derives an Argon2id PHC string from the raw password with a fresh 16-byte
/// random salt. The raw password is neither stored nor logged.
pub fn hash_password(password: &str, params: PasswordParams) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;

    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// verify_password
///
/// Cost parameters are read back from the stored PHC string. A malformed
/// stored hash simply fails verification.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// dummy_hash
///
/// A PHC string for a password no account holds, derived once per cost
/// setting. Verifying against it costs the same as checking a real credential,
/// so a login for an unknown email does the same Argon2 work as a wrong password.
pub fn dummy_hash(params: PasswordParams) -> Result<String, AppError> {
    static CACHE: OnceLock<Mutex<HashMap<PasswordParams, String>>> = OnceLock::new();
    let cache = CACHE.get_or_init(Default::default);

    let cached = cache
        .lock()
        .map_err(|e| AppError::Internal(e.to_string()))?
        .get(&params)
        .cloned();
    if let Some(hash) = cached {
        return Ok(hash);
    }

    let hash = hash_password("unused-login-placeholder", params)?;
    let mut entries = cache.lock().map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(entries.entry(params).or_insert(hash).clone())
}
