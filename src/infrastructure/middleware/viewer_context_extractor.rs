// ViewerContext Extractor - handlers take `vc: Vc` instead of digging through extensions

use crate::infrastructure::viewer::ViewerContext;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

/// Cheap-to-clone handle on the request's ViewerContext.
///
/// ```ignore
/// async fn handler(vc: Vc) -> impl IntoResponse {
///     let user = vc.require_user()?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn arc(self) -> Arc<ViewerContext> {
        self.0
    }
}

// Field access straight through: vc.user, vc.request_id, vc.is_authenticated()
impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ViewerContext> for Vc {
    fn as_ref(&self) -> &ViewerContext {
        &self.0
    }
}

// A missing context means the middleware was not installed on this route
impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}
