//! Password hashing and verification.
//!
//! Secrets are Argon2id PHC strings produced with a fixed work factor
//! (19 MiB memory, 2 passes, 1 lane). Verification reads the parameters
//! embedded in the stored string, so older secrets keep verifying if the
//! constants below are raised.

use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

/// Memory cost in KiB.
pub const MEMORY_COST_KIB: u32 = 19 * 1024;
/// Number of passes over memory.
pub const TIME_COST: u32 = 2;
pub const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("argon2 parameters rejected: {0}")]
    Params(argon2::Error),
    #[error("hash primitive failed: {0}")]
    Primitive(password_hash::Error),
    #[error("stored secret is unreadable: {0}")]
    Corrupt(password_hash::Error),
    #[error("hashing task aborted")]
    Aborted,
}

/// Opaque hashed representation of a password. Never serialized.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct PasswordSecret(String);

impl PasswordSecret {
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordSecret(<redacted>)")
    }
}

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(CredentialError::Params)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash(plain: &str) -> Result<PasswordSecret, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = hasher()?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            CredentialError::Primitive(e)
        })?
        .to_string();
    Ok(PasswordSecret(phc))
}

/// `Ok(false)` means the password does not match; `Err` means the secret or
/// the primitive is broken.
pub fn verify(plain: &str, secret: &PasswordSecret) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(&secret.0).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        CredentialError::Corrupt(e)
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verify_password error");
            Err(CredentialError::Primitive(e))
        }
    }
}

/// Runs [`hash`] on the blocking pool so request intake is not stalled.
pub async fn hash_blocking(plain: String) -> Result<PasswordSecret, CredentialError> {
    tokio::task::spawn_blocking(move || hash(&plain))
        .await
        .map_err(|_| CredentialError::Aborted)?
}

pub async fn verify_blocking(
    plain: String,
    secret: PasswordSecret,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify(&plain, &secret))
        .await
        .map_err(|_| CredentialError::Aborted)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let secret = hash(password).expect("hashing should succeed");
        assert!(verify(password, &secret).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password_without_error() {
        let secret = hash("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify("wrong-password", &secret).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_secret() {
        let err = verify("anything", &PasswordSecret::from_phc("not-a-valid-hash")).unwrap_err();
        assert!(matches!(err, CredentialError::Corrupt(_)));
    }

    #[test]
    fn secret_uses_fixed_work_factor() {
        let secret = hash("pw").unwrap();
        let s = secret.as_str();
        assert!(s.starts_with("$argon2id$v=19$"));
        assert!(s.contains(&format!("m={},t={},p={}", MEMORY_COST_KIB, TIME_COST, PARALLELISM)));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash("repeat").unwrap();
        let b = hash("repeat").unwrap();
        assert_ne!(a, b);
        assert!(verify("repeat", &a).unwrap());
        assert!(verify("repeat", &b).unwrap());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let secret = hash("hunter2").unwrap();
        assert_eq!(format!("{:?}", secret), "PasswordSecret(<redacted>)");
    }

    #[tokio::test]
    async fn blocking_wrappers_agree_with_sync_versions() {
        let secret = hash_blocking("off-thread".into()).await.unwrap();
        assert!(verify_blocking("off-thread".into(), secret.clone()).await.unwrap());
        assert!(!verify_blocking("other".into(), secret).await.unwrap());
    }
}
