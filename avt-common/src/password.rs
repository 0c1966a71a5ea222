//! Credential hashing
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$...`),
//! which carry their own salt and cost parameters.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::warn;

use crate::{Error, Result};

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a candidate password against a stored PHC string
///
/// A stored value that does not parse never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unreadable stored password hash: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_phc_string() {
        let stored = hash_password("secret1").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(PasswordHash::new(&stored).is_ok());
    }

    #[test]
    fn verify_accepts_correct_password() {
        let stored = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &stored));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let stored = hash_password("correct horse").unwrap();
        assert!(!verify_password("battery staple", &stored));
    }

    #[test]
    fn same_password_gets_distinct_hashes() {
        let a = hash_password("password").unwrap();
        let b = hash_password("password").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("password", &a));
        assert!(verify_password("password", &b));
    }

    #[test]
    fn malformed_stored_hash_is_rejected() {
        assert!(!verify_password("password", "abc"));
        assert!(!verify_password("password", ""));
    }
}
