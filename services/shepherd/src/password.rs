//! Password hashing and verification using Argon2id.

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};

use crate::error::{AuthError, Result};

/// Hash a password for storage.
///
/// # Errors
/// Returns an internal error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Internal("failed to hash password".to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// # Errors
/// Returns `InvalidCredentials` on mismatch; a malformed stored hash is an
/// internal error since it means the record itself is corrupt.
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AuthError::Internal("stored password hash is malformed".to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Check password strength for new passwords: at least eight characters with
/// an uppercase letter, a lowercase letter, and a digit.
///
/// # Errors
/// Returns a validation error describing the policy on failure.
pub fn validate_new_password(password: &str) -> Result<()> {
    let long_enough = password.len() >= 8;
    let has_uppercase = password.chars().any(char::is_uppercase);
    let has_lowercase = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_uppercase && has_lowercase && has_digit {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "Password must be at least 8 characters and contain an uppercase letter, a lowercase letter, and a digit".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("Secret123").unwrap();
        assert!(verify_password("Secret123", &hash).is_ok());
    }

    #[test]
    fn wrong_password_rejected() {
        let hash = hash_password("Secret123").unwrap();
        assert!(matches!(
            verify_password("Secret124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("Secret123").unwrap();
        let second = hash_password("Secret123").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stored_hash_is_internal() {
        assert!(matches!(
            verify_password("Secret123", "not-a-phc-string"),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn strength_policy() {
        assert!(validate_new_password("Secret123").is_ok());
        assert!(validate_new_password("Sh0rt1").is_err());
        assert!(validate_new_password("alllowercase1").is_err());
        assert!(validate_new_password("ALLUPPERCASE1").is_err());
        assert!(validate_new_password("NoDigitsHere").is_err());
    }
}
