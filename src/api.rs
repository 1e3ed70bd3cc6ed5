// Read-only REST API over posts and categories

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::Vc,
    models::{CategoryResource, PostResource},
};

pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostResource>>> {
    let posts = state.db.list_published_posts().await?;
    Ok(Json(
        posts
            .into_iter()
            .map(|listing| PostResource::from(listing.post))
            .collect(),
    ))
}

/// Authenticated callers only; unpublished posts are hidden like missing ones.
pub async fn get_post(
    State(state): State<AppState>,
    vc: Vc,
    Path(post_id): Path<i64>,
) -> AppResult<Json<PostResource>> {
    vc.require_user()?;

    let post = state
        .db
        .get_post(post_id)
        .await?
        .filter(|post| post.is_published)
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
    Ok(Json(post.into()))
}

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryResource>>> {
    let categories = state.db.list_categories().await?;
    Ok(Json(categories.into_iter().map(CategoryResource::from).collect()))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
) -> AppResult<Json<CategoryResource>> {
    let category = state
        .db
        .get_category(category_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))?;
    Ok(Json(category.into()))
}
