use crate::error::{AppError, AppResult};
use crate::models::{User, UserPublic};

/// Who is making the current request. Built once per request by the
/// viewer-context middleware and read by handlers through `Vc`.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    pub user: Option<User>,
    pub session_token: Option<String>,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            request_id,
            user: None,
            session_token: None,
        }
    }

    pub fn authenticated_user(user: User, session_token: String, request_id: String) -> Self {
        ViewerContext {
            request_id,
            user: Some(user),
            session_token: Some(session_token),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn public_user(&self) -> Option<UserPublic> {
        self.user.as_ref().map(UserPublic::from)
    }

    /// The signed-in user, or `Unauthorized` for anonymous requests.
    pub fn require_user(&self) -> AppResult<&User> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided.".to_string()))
    }
}
