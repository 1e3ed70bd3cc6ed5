// Identity provider - accounts and login sessions behind one injected interface

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::AuthConfig;
use crate::database::BlogDatabase;
use crate::error::{AppError, AppResult};
use crate::infrastructure::security::{generate_session_token, PasswordService};
use crate::models::{NewUser, Session, User};

/// Everything the blog needs from an authentication system. Handlers only
/// ever talk to this trait, so a different backend can be swapped in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token to its user. Unknown, expired and inactive
    /// sessions all resolve to `None`.
    async fn current_user(&self, token: &str) -> AppResult<Option<User>>;

    /// Check credentials and open a session. Wrong credentials are `Unauthorized`.
    async fn login(&self, username: &str, password: &str) -> AppResult<(User, Session)>;

    async fn logout(&self, token: &str) -> AppResult<()>;

    /// Create an account. A taken username is a `Validation` error.
    async fn register(&self, new_user: &NewUser) -> AppResult<User>;

    async fn change_password(&self, user_id: i64, old_password: &str, new_password: &str) -> AppResult<()>;

    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>>;
}

pub struct SqliteIdentityProvider {
    db: Arc<BlogDatabase>,
    passwords: PasswordService,
    session_ttl: Duration,
}

impl SqliteIdentityProvider {
    pub fn new(db: Arc<BlogDatabase>, config: &AuthConfig) -> AppResult<Self> {
        Ok(Self {
            db,
            passwords: PasswordService::new(config)?,
            session_ttl: Duration::hours(config.session_ttl_hours),
        })
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, is_active, date_joined FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_active(&self, user_id: i64, is_active: bool) -> AppResult<()> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(user_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    async fn current_user(&self, token: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, (i64, chrono::DateTime<Utc>)>(
            "SELECT user_id, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.db.pool)
                .await?;
            return Ok(None);
        }

        Ok(self.get_user(user_id).await?.filter(|user| user.is_active))
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> AppResult<(User, Session)> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let user = self.find_by_username(username).await?.ok_or_else(invalid)?;

        if !self.passwords.verify_password(password, &user.password_hash)? {
            warn!("Failed login for {}", username);
            return Err(invalid());
        }
        if !user.is_active {
            warn!("Login attempt for inactive account {}", username);
            return Err(invalid());
        }

        let now = Utc::now();
        let session = Session {
            token: generate_session_token(),
            user_id: user.id,
            expires_at: now + self.session_ttl,
        };

        sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&session.token)
            .bind(session.user_id)
            .bind(now)
            .bind(session.expires_at)
            .execute(&self.db.pool)
            .await?;

        info!("User {} logged in", user.username);
        Ok((user, session))
    }

    async fn logout(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn register(&self, new_user: &NewUser) -> AppResult<User> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(AppError::Validation(
                "A user with that username already exists.".to_string(),
            ));
        }

        let password_hash = self.passwords.hash_password(&new_user.password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, is_active, date_joined) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(now)
        .execute(&self.db.pool)
        .await?;

        info!("Registered user {}", new_user.username);

        Ok(User {
            id: result.last_insert_rowid(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash,
            is_active: true,
            date_joined: now,
        })
    }

    async fn change_password(&self, user_id: i64, old_password: &str, new_password: &str) -> AppResult<()> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        if !self.passwords.verify_password(old_password, &user.password_hash)? {
            return Err(AppError::Validation(
                "Your old password was entered incorrectly.".to_string(),
            ));
        }

        let password_hash = self.passwords.hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.db.pool)
            .await?;

        info!("User {} changed their password", user.username);
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, is_active, date_joined FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }
}
