// Shared harness for driving the full router in-process
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use cooking_blog::{
    config::Config,
    create_router,
    database::BlogDatabase,
    models::{Category, NewPost, NewUser, Post, User},
    AppState,
};

pub const BOUNDARY: &str = "cooking-blog-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub media: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let media = tempfile::tempdir().unwrap();
        let mut config = Config::for_testing(media.path());
        adjust(&mut config);

        let db = Arc::new(BlogDatabase::new_in_memory().await.unwrap());
        let state = AppState::with_database(config, db).unwrap();
        let router = create_router(state.clone());
        Self { state, router, media }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let request = with_session(Request::get(uri), token).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, token: Option<&str>) -> Response<Body> {
        let request = with_session(Request::post(uri), token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&self, uri: &str, body: Vec<u8>, token: Option<&str>) -> Response<Body> {
        let request = with_session(Request::post(uri), token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Registers an account and opens a session for it; returns the user and token.
    pub async fn sign_up(&self, username: &str) -> (User, String) {
        self.state
            .identity
            .register(&NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        let (user, session) = self.state.identity.login(username, "correct horse").await.unwrap();
        (user, session.token)
    }

    pub async fn category(&self, title: &str) -> Category {
        self.state.db.create_category(title).await.unwrap()
    }

    pub async fn post(&self, title: &str, content: &str, category_id: i64, author_id: Option<i64>) -> Post {
        self.state
            .db
            .create_post(&NewPost {
                title: title.to_string(),
                content: Some(content.to_string()),
                is_published: true,
                category_id,
                author_id,
                ..NewPost::default()
            })
            .await
            .unwrap()
    }
}

fn with_session(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::COOKIE, format!("sessionid={}", token)),
        None => builder,
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Builds a multipart body from text fields and an optional file part.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
