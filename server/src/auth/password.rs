use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::errors::DirectoryError;

/// Hashes a password with Argon2id and a random salt, returning the PHC
/// string to store.
pub fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DirectoryError::PasswordHashing(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks a password against a stored hash. A mismatch is reported as
/// invalid credentials; an unreadable hash as a hashing failure.
pub fn verify_password(password: &str, stored: &str) -> Result<(), DirectoryError> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| DirectoryError::PasswordHashing(e.to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| DirectoryError::InvalidCredentials)
}

/// Runs [`hash_password`] off the async executor.
pub async fn hash_password_blocking(password: String) -> Result<String, DirectoryError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DirectoryError::PasswordHashing(e.to_string()))?
}

/// Runs [`verify_password`] off the async executor.
pub async fn verify_password_blocking(
    password: String,
    stored: String,
) -> Result<(), DirectoryError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| DirectoryError::PasswordHashing(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("segredo").unwrap();

        assert!(verify_password("segredo", &hash).is_ok());
        assert!(matches!(
            verify_password("segredo2", &hash),
            Err(DirectoryError::InvalidCredentials)
        ));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("segredo").unwrap(), hash_password("segredo").unwrap());
    }

    #[test]
    fn garbage_hashes_are_not_credentials_errors() {
        assert!(matches!(
            verify_password("segredo", "not a hash"),
            Err(DirectoryError::PasswordHashing(_))
        ));
    }
}
