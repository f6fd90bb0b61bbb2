//! Password hashing helpers built on argon2.
//!
//! Stored values are PHC strings (`$argon2id$...`).  Verification goes
//! through the `password_hash` API, which carries its own constant-time
//! comparison; anything that does not parse as a PHC string is rejected
//! outright rather than compared verbatim.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{CoreError, Result};

/// Length of generated one-time agent passwords.
const GENERATED_PASSWORD_LEN: usize = 12;

/// Hash a plaintext password into a PHC string with a fresh salt.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| CoreError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch and `Err` only when the stored value is
/// not a valid PHC hash.
pub fn verify_password(plain: &str, stored: &str) -> std::result::Result<bool, ()> {
    let parsed = PasswordHash::new(stored).map_err(|_| ())?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// True if the stored value parses as a PHC hash.  Anything else is a legacy
/// plaintext row that the offline migration must rehash.
pub fn is_phc_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}

/// Generate a random alphanumeric password for a new agent account.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_eq!(verify_password("s3cret", &hash), Ok(true));
        assert_eq!(verify_password("wrong", &hash), Ok(false));
    }

    #[test]
    fn plaintext_is_not_a_hash() {
        assert!(!is_phc_hash("hunter2"));
        assert!(verify_password("hunter2", "hunter2").is_err());

        let hash = hash_password("hunter2").unwrap();
        assert!(is_phc_hash(&hash));
    }

    #[test]
    fn generated_passwords_have_expected_shape() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
