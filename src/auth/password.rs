//! Account password hashing (Argon2id) and password policy

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::types::WridersError;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted password length; bounds hashing cost per request
pub const MAX_PASSWORD_LEN: usize = 128;

/// Check a candidate password against the account policy
pub fn check_password_policy(password: &str) -> Result<(), WridersError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(WridersError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(WridersError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    if password.trim().is_empty() {
        return Err(WridersError::Validation(
            "Password cannot be only whitespace".into(),
        ));
    }
    Ok(())
}

/// Hash a password into a PHC string (salt and parameters included)
pub fn hash_password(password: &str) -> Result<String, WridersError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WridersError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, WridersError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| WridersError::Auth(format!("Stored password hash is malformed: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("chapter-one-begins").unwrap();
        assert!(hash.starts_with("$argon2id"));
        assert!(verify_password("chapter-one-begins", &hash).unwrap());
        assert!(!verify_password("chapter-two-begins", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("password", "plaintext").is_err());
    }

    #[test]
    fn test_policy_bounds() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("        ").is_err());
        assert!(check_password_policy("exactly8").is_ok());
        assert!(check_password_policy(&"x".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }
}
