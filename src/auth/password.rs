//! Argon2 password hashing.
//!
//! Argon2 is deliberately slow, so both operations run on tokio's blocking
//! pool and handlers only await the result.

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task;
use tracing::error;

/// Hashes `plain` into a PHC string (`$argon2id$...`) with a fresh salt.
pub async fn hash_password(plain: String) -> anyhow::Result<String> {
    task::spawn_blocking(move || argon2_hash(&plain))
        .await
        .context("password hashing task failed")?
}

/// Checks `plain` against a stored PHC hash. A hash that does not parse is
/// an error rather than a mismatch.
pub async fn verify_password(plain: String, stored: String) -> anyhow::Result<bool> {
    task::spawn_blocking(move || argon2_verify(&plain, &stored))
        .await
        .context("password verification task failed")?
}

fn argon2_hash(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 could not hash password");
            anyhow::anyhow!("hash password: {e}")
        })
}

fn argon2_verify(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash does not parse");
        anyhow::anyhow!("stored password hash is malformed: {e}")
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("verify password: {e}")),
    }
}
