// Route table for pages, account views, the REST API and media files

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    api,
    app_state::AppState,
    handlers::{auth, comments, pages, posts},
    infrastructure::viewer_context_middleware,
};

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.media.max_upload_bytes;
    let media = ServeDir::new(state.media.root());

    Router::new()
        // Blog pages
        .route("/", get(pages::index))
        .route("/category/{id}/", get(pages::category))
        .route("/post/{id}/", get(pages::post_detail))
        .route("/search/", get(pages::search))
        .route("/add_article/", get(posts::add_article_form).post(posts::add_article))
        .route(
            "/post/{id}/update/",
            get(posts::update_article_form).post(posts::update_article),
        )
        .route(
            "/post/{id}/delete/",
            get(posts::delete_article_form).post(posts::delete_article),
        )
        // Accounts
        .route("/login/", get(auth::login_form).post(auth::login))
        .route("/logout/", post(auth::logout))
        .route("/register/", get(auth::register_form).post(auth::register))
        .route(
            "/password/",
            get(auth::password_change_form).post(auth::password_change),
        )
        .route(
            "/add_comment/{post_id}/",
            get(comments::add_comment_form).post(comments::add_comment),
        )
        .route("/profile/{user_id}/", get(pages::profile))
        // REST API
        .route("/posts/api/", get(api::list_posts))
        .route("/posts/api/{id}/", get(api::get_post))
        .route("/categories/api/", get(api::list_categories))
        .route("/categories/api/{id}/", get(api::get_category))
        .route("/health/", get(pages::health))
        .nest_service("/media", media)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    viewer_context_middleware::<AppState>,
                )),
        )
        .with_state(state)
}
