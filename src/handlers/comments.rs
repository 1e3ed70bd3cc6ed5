use axum::{
    extract::{Path, State},
    http::Uri,
    response::{IntoResponse, Redirect},
    Form,
};
use serde::Serialize;
use tracing::info;

use super::{login_required, render, render_invalid, PageResult};
use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    forms::{CommentForm, FormErrors},
    infrastructure::Vc,
    models::Post,
};

#[derive(Serialize)]
struct CommentPage {
    post: Post,
    text: String,
    errors: FormErrors,
}

async fn commented_post(state: &AppState, post_id: i64) -> AppResult<Post> {
    state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
}

pub async fn add_comment_form(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> PageResult {
    login_required(&vc, &uri)?;
    let post = commented_post(&state, post_id).await?;
    let page = CommentPage {
        post,
        text: String::new(),
        errors: FormErrors::new(),
    };
    render(&state, &vc, "Add a comment", page).await
}

/// The comment is always attributed to the signed-in viewer.
pub async fn add_comment(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let post = commented_post(&state, post_id).await?;

    let form = match form.clone().clean() {
        Ok(form) => form,
        Err(errors) => {
            let page = CommentPage {
                post,
                text: form.text,
                errors,
            };
            return render_invalid(&state, &vc, "Add a comment", page).await;
        }
    };

    let comment = state.db.create_comment(post.id, user.id, &form.text).await?;
    info!("{} commented on post {} (comment {})", user.username, post.id, comment.id);

    Ok(Redirect::to(&format!("/post/{}/", post.id)).into_response())
}
