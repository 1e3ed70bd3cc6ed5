// Page handlers. Each route answers with the context a template would receive
// (as JSON) or a redirect.

pub mod auth;
pub mod comments;
pub mod pages;
pub mod posts;

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::{
    app_state::AppState,
    config::AuthConfig,
    error::AppError,
    infrastructure::{Vc, SESSION_COOKIE},
    models::{CategoryWithCount, User, UserPublic},
};

pub type PageResult = Result<Response, PageError>;

/// Errors on page routes. Anonymous access to a protected page becomes a
/// redirect to the login form; everything else renders like `AppError`.
#[derive(Debug)]
pub enum PageError {
    LoginRequired { next: String },
    App(AppError),
}

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError::App(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::LoginRequired { next } => login_redirect(&next).into_response(),
            PageError::App(AppError::Unauthorized(_)) => login_redirect("/").into_response(),
            PageError::App(err) => err.into_response(),
        }
    }
}

// Query-value escaping that leaves path separators readable.
const NEXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn login_redirect(next: &str) -> Redirect {
    Redirect::to(&format!("/login/?next={}", utf8_percent_encode(next, NEXT_VALUE)))
}

/// The signed-in user, or a redirect back to this page after login.
pub fn login_required<'a>(vc: &'a Vc, uri: &Uri) -> Result<&'a User, PageError> {
    vc.user.as_ref().ok_or_else(|| PageError::LoginRequired {
        next: uri.path().to_string(),
    })
}

/// What every page receives, plus the page's own fields flattened in.
#[derive(Debug, Serialize)]
pub struct PageContext<T: Serialize> {
    pub title: String,
    pub viewer: Option<UserPublic>,
    pub categories: Vec<CategoryWithCount>,
    #[serde(flatten)]
    pub body: T,
}

pub async fn render<T: Serialize>(
    state: &AppState,
    vc: &Vc,
    title: impl Into<String>,
    body: T,
) -> PageResult {
    render_with_status(state, vc, StatusCode::OK, title, body).await
}

/// Re-render a form page after failed validation.
pub async fn render_invalid<T: Serialize>(
    state: &AppState,
    vc: &Vc,
    title: impl Into<String>,
    body: T,
) -> PageResult {
    render_with_status(state, vc, StatusCode::UNPROCESSABLE_ENTITY, title, body).await
}

async fn render_with_status<T: Serialize>(
    state: &AppState,
    vc: &Vc,
    status: StatusCode,
    title: impl Into<String>,
    body: T,
) -> PageResult {
    let context = PageContext {
        title: title.into(),
        viewer: vc.public_user(),
        categories: state.db.list_categories_with_published_posts().await?,
        body,
    };
    Ok((status, Json(context)).into_response())
}

pub fn session_cookie(token: &str, auth: &AuthConfig) -> String {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.session_cookie_secure)
        .max_age(CookieDuration::hours(auth.session_ttl_hours))
        .build()
        .to_string()
}

pub fn cleared_session_cookie() -> String {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie.to_string()
}
