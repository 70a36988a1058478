use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;

use super::error::AuthError;

fn hashing_failed(stage: &'static str) -> impl FnOnce(password_hash::Error) -> AuthError {
    move |e| {
        tracing::error!(error = %e, stage, "argon2 failure");
        AuthError::Hashing(format!("{stage}: {e}"))
    }
}

/// Argon2id digest in PHC form, salted per call.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(hashing_failed("hash"))
}

/// `Ok(false)` on mismatch; `Err` only when the stored digest is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, AuthError> {
    let digest = PasswordHash::new(stored).map_err(hashing_failed("parse stored digest"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &digest) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hashing_failed("verify")(e)),
    }
}

lazy_static! {
    static ref DECOY_DIGEST: String = hash_password("decoy-password").unwrap_or_default();
}

/// Spends one verification's worth of work for logins against unknown
/// accounts, so they cost the same as a wrong password.
pub fn verify_decoy(plain: &str) {
    let _ = verify_password(plain, &DECOY_DIGEST);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_phc_and_verifies() {
        let hash = hash_password("pw1").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));
        assert!(verify_password("pw1", &hash).unwrap());
        assert!(!verify_password("pw2", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw1").unwrap();
        let b = hash_password("pw1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decoy_digest_is_a_real_argon2_hash() {
        assert!(DECOY_DIGEST.starts_with("$argon2id$"));
        assert!(!verify_password("pw1", &DECOY_DIGEST).unwrap());
        verify_decoy("pw1");
    }

    #[test]
    fn unreadable_digest_is_a_hashing_error() {
        let err = verify_password("anything", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AuthError::Hashing(ref m) if m.starts_with("parse stored digest")));
    }
}
