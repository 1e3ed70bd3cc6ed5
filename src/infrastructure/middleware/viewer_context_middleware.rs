// ViewerContext Middleware - resolves the caller's identity once per request
// and injects it into request extensions for handlers

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::infrastructure::{identity::IdentityProvider, viewer::ViewerContext};

pub const SESSION_COOKIE: &str = "sessionid";

/// Trait for application state that can resolve identities
pub trait HasIdentityProvider {
    fn identity(&self) -> &Arc<dyn IdentityProvider>;
}

/// Creates the request-scoped ViewerContext. Identity lookups that fail are
/// logged and treated as anonymous so a broken session never takes a page down.
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Response
where
    T: HasIdentityProvider + Clone + Send + Sync + 'static,
{
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match extract_session_token(request.headers()) {
        Some(token) => match app_state.identity().current_user(&token).await {
            Ok(Some(user)) => ViewerContext::authenticated_user(user, token, request_id),
            Ok(None) => ViewerContext::anonymous(request_id),
            Err(e) => {
                warn!("Failed to resolve session for {}: {}", request_id, e);
                ViewerContext::anonymous(request_id)
            }
        },
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));

    next.run(request).await
}

/// Session token from `Authorization: Bearer <token>`, falling back to the session cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer token123"));
        assert_eq!(extract_session_token(&headers), Some("token123".to_string()));
    }

    #[test]
    fn test_extract_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; sessionid=abc-123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer from-header"));
        headers.insert("cookie", HeaderValue::from_static("sessionid=from-cookie"));
        assert_eq!(extract_session_token(&headers), Some("from-header".to_string()));
    }

    #[test]
    fn test_anonymous_request_has_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert("cookie", HeaderValue::from_static("sessionid="));
        assert_eq!(extract_session_token(&headers), None);
    }
}
