// Password hashing and session token primitives

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use rand_core::OsRng;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2id hasher with cost parameters taken from configuration.
#[derive(Clone)]
pub struct PasswordService {
    params: Params,
}

impl PasswordService {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let params = Params::new(config.argon2_memory_kib, config.argon2_iterations, 1, None)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string safe for database storage
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();
        Ok(hash)
    }

    /// Constant-time verification against a stored PHC string
    pub fn verify_password(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
        }
    }
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_service() -> PasswordService {
        PasswordService::new(&AuthConfig {
            argon2_memory_kib: 8,
            argon2_iterations: 1,
            ..AuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = cheap_service();
        let hash = service.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("correct horse", &hash).unwrap());
        assert!(!service.verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let service = cheap_service();
        let first = service.hash_password("same password").unwrap();
        let second = service.hash_password("same password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let service = cheap_service();
        assert!(service.verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_session_tokens_are_unique_and_url_safe() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = PasswordService::new(&AuthConfig {
            argon2_memory_kib: 0,
            ..AuthConfig::default()
        });
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }
}
