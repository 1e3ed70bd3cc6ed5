use serde::{Deserialize, Serialize};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub seed_sample_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub session_cookie_secure: bool,
    /// When set, only a post's author may update or delete it.
    pub enforce_post_ownership: bool,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 14,
            session_cookie_secure: false,
            enforce_post_ownership: true,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let auth_defaults = AuthConfig::default();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/cooking_blog.db".to_string()),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
            },
            media: MediaConfig {
                root: env::var("MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("media")),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            },
            auth: AuthConfig {
                session_ttl_hours: parse_var("SESSION_TTL_HOURS", auth_defaults.session_ttl_hours)?,
                session_cookie_secure: parse_var(
                    "SESSION_COOKIE_SECURE",
                    auth_defaults.session_cookie_secure,
                )?,
                enforce_post_ownership: parse_var(
                    "ENFORCE_POST_OWNERSHIP",
                    auth_defaults.enforce_post_ownership,
                )?,
                argon2_memory_kib: parse_var("ARGON2_MEMORY_KIB", auth_defaults.argon2_memory_kib)?,
                argon2_iterations: parse_var("ARGON2_ITERATIONS", auth_defaults.argon2_iterations)?,
            },
            seed_sample_data: parse_var("SEED_SAMPLE_DATA", false)?,
        })
    }

    /// Configuration for tests and local experiments: in-memory database,
    /// cheap password hashing.
    pub fn for_testing(media_root: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            media: MediaConfig {
                root: media_root.into(),
                max_upload_bytes: 1024 * 1024,
            },
            auth: AuthConfig {
                argon2_memory_kib: 8,
                argon2_iterations: 1,
                ..AuthConfig::default()
            },
            seed_sample_data: false,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            anyhow::Error::new(AppError::ConfigurationError(format!(
                "invalid value for {}: {}",
                key, e
            )))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u16 = parse_var("COOKING_BLOG_UNSET_TEST_VAR", 4242).unwrap();
        assert_eq!(value, 4242);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("COOKING_BLOG_BAD_PORT_TEST_VAR", "not-a-port");
        let value: anyhow::Result<u16> = parse_var("COOKING_BLOG_BAD_PORT_TEST_VAR", 1);
        assert!(value.is_err());
        env::remove_var("COOKING_BLOG_BAD_PORT_TEST_VAR");
    }

    #[test]
    fn test_testing_config_is_in_memory() {
        let config = Config::for_testing("/tmp/media");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 1);
        assert!(config.auth.enforce_post_ownership);
        assert_eq!(config.server_address(), "127.0.0.1:0");
    }
}
