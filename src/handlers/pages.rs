// Read-only pages: index, category, post detail, search, profile

use axum::extract::{Path, Query, State};
use serde::Serialize;
use tracing::warn;

use super::{render, PageResult};
use crate::{
    app_state::AppState,
    error::AppError,
    forms::SearchParams,
    infrastructure::Vc,
    models::{Category, CommentWithAuthor, PostListing, Tag, UserPublic},
};

/// Size of the "more to read" sidebar on the detail page.
pub const POPULAR_POSTS_LIMIT: i64 = 5;

#[derive(Serialize)]
struct PostList {
    posts: Vec<PostListing>,
}

#[derive(Serialize)]
struct CategoryPage {
    category: Category,
    posts: Vec<PostListing>,
}

#[derive(Serialize)]
struct PostDetail {
    post: PostListing,
    tags: Vec<Tag>,
    comments: Vec<CommentWithAuthor>,
    popular_posts: Vec<PostListing>,
    can_comment: bool,
}

#[derive(Serialize)]
struct SearchResults {
    query: String,
    posts: Vec<PostListing>,
}

#[derive(Serialize)]
struct ProfilePage {
    profile: UserPublic,
    posts: Vec<PostListing>,
}

pub async fn index(State(state): State<AppState>, vc: Vc) -> PageResult {
    let posts = state.db.list_published_posts().await?;
    render(&state, &vc, "Home", PostList { posts }).await
}

pub async fn category(
    State(state): State<AppState>,
    vc: Vc,
    Path(category_id): Path<i64>,
) -> PageResult {
    let category = state
        .db
        .get_category(category_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))?;
    let posts = state.db.list_posts_by_category(category_id).await?;

    let title = category.title.clone();
    render(&state, &vc, title, CategoryPage { category, posts }).await
}

pub async fn post_detail(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<i64>,
) -> PageResult {
    // Count the view before reading so the page shows the new total.
    if let Err(e) = state.db.increment_post_views(post_id).await {
        warn!("Failed to count view of post {}: {}", post_id, e);
    }

    let post = state
        .db
        .get_post_listing(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
    let tags = state.db.tags_for_post(post_id).await?;
    let comments = state.db.list_comments_for_post(post_id).await?;
    let popular_posts = state.db.list_popular_posts(post_id, POPULAR_POSTS_LIMIT).await?;

    let title = post.post.title.clone();
    let detail = PostDetail {
        post,
        tags,
        comments,
        popular_posts,
        can_comment: vc.is_authenticated(),
    };
    render(&state, &vc, title, detail).await
}

pub async fn search(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<SearchParams>,
) -> PageResult {
    let query = params.q.unwrap_or_default().trim().to_string();
    let posts = state.db.search_posts(&query).await?;
    render(&state, &vc, "Search results", SearchResults { query, posts }).await
}

pub async fn profile(
    State(state): State<AppState>,
    vc: Vc,
    Path(user_id): Path<i64>,
) -> PageResult {
    let user = state
        .identity
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
    let posts = state.db.list_posts_by_author(user_id).await?;

    let profile = UserPublic::from(&user);
    let title = format!("{}'s profile", profile.username);
    render(&state, &vc, title, ProfilePage { profile, posts }).await
}

pub async fn health(State(state): State<AppState>) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;
    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "cooking_blog",
    })))
}
