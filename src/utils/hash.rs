use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use crate::error::AppError;

/// Number of digits in a freshly generated credential secret.
pub const SECRET_DIGITS: usize = 6;

/// Produces a random numeric credential secret, e.g. "048213".
pub fn generate_secret() -> String {
    let value = OsRng.next_u32() % 10u32.pow(SECRET_DIGITS as u32);
    format!("{:0width$}", value, width = SECRET_DIGITS)
}

pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let digest = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    Ok(digest)
}

/// Returns `Ok(false)` on mismatch; an unparsable digest is an internal error.
pub fn verify_secret(secret: &str, digest: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(digest).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}
