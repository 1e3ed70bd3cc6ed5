// Post authoring: create, update and delete through multipart forms

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::Uri,
    response::{IntoResponse, Redirect},
};
use serde::Serialize;
use tracing::info;

use super::{login_required, render, render_invalid, PageResult};
use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    forms::{CleanedPostForm, FormErrors, PostForm},
    infrastructure::{MediaStore, Vc},
    models::{Category, NewPost, Post, PostChanges, Tag, User},
};

pub struct UploadedPhoto {
    pub file_name: String,
    pub bytes: Bytes,
}

#[derive(Serialize)]
struct PostFormPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<Post>,
    form: PostForm,
    errors: FormErrors,
    category_choices: Vec<Category>,
    tag_choices: Vec<Tag>,
}

#[derive(Serialize)]
struct DeletePage {
    post: Post,
}

async fn form_page(
    state: &AppState,
    post: Option<Post>,
    form: PostForm,
    errors: FormErrors,
) -> AppResult<PostFormPage> {
    Ok(PostFormPage {
        post,
        form,
        errors,
        category_choices: state.db.list_categories().await?,
        tag_choices: state.db.list_tags().await?,
    })
}

/// Split a multipart body into the post fields and the optional photo.
pub async fn read_post_form(mut multipart: Multipart) -> AppResult<(PostForm, Option<UploadedPhoto>)> {
    let mut form = PostForm::default();
    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "photo" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            // Browsers send an empty, nameless part when no file was chosen.
            if !file_name.is_empty() {
                photo = Some(UploadedPhoto { file_name, bytes });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match name.as_str() {
            "title" => form.title = value,
            "content" => form.content = value,
            "category" => form.category = value,
            "tags" => form.tags.push(value),
            _ => {}
        }
    }

    Ok((form, photo))
}

/// Field validation plus the checks that need the database.
async fn clean_post_form(
    state: &AppState,
    form: &PostForm,
    photo: Option<&UploadedPhoto>,
) -> AppResult<Result<CleanedPostForm, FormErrors>> {
    let (cleaned, mut errors) = match form.clone().clean() {
        Ok(cleaned) => (Some(cleaned), FormErrors::new()),
        Err(errors) => (None, errors),
    };

    if let Some(cleaned) = &cleaned {
        if state.db.get_category(cleaned.category_id).await?.is_none() {
            errors.add(
                "category",
                "Select a valid choice. That choice is not one of the available choices.",
            );
        }
        let known = state.db.existing_tag_ids(&cleaned.tag_ids).await?;
        for id in cleaned.tag_ids.iter().filter(|id| !known.contains(id)) {
            errors.add(
                "tags",
                format!("Select a valid choice. {} is not one of the available choices.", id),
            );
        }
    }

    if let Some(photo) = photo {
        if let Err(AppError::Validation(message)) = MediaStore::validate_photo(&photo.file_name, &photo.bytes) {
            errors.add("photo", message);
        }
    }

    match cleaned {
        Some(cleaned) if errors.is_empty() => Ok(Ok(cleaned)),
        _ => Ok(Err(errors)),
    }
}

async fn store_photo(state: &AppState, photo: Option<UploadedPhoto>) -> AppResult<Option<String>> {
    match photo {
        Some(photo) => Ok(Some(state.media.save_photo(&photo.file_name, &photo.bytes).await?)),
        None => Ok(None),
    }
}

async fn load_post(state: &AppState, post_id: i64) -> AppResult<Post> {
    state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
}

/// Only the author may change a post unless ownership enforcement is off.
fn ensure_can_edit(state: &AppState, user: &User, post: &Post) -> AppResult<()> {
    if !state.config.auth.enforce_post_ownership || post.author_id == Some(user.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to modify this post.".to_string(),
        ))
    }
}

pub async fn add_article_form(State(state): State<AppState>, vc: Vc, uri: Uri) -> PageResult {
    login_required(&vc, &uri)?;
    let page = form_page(&state, None, PostForm::default(), FormErrors::new()).await?;
    render(&state, &vc, "Add an article", page).await
}

pub async fn add_article(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    multipart: Multipart,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let (form, photo) = read_post_form(multipart).await?;

    let cleaned = match clean_post_form(&state, &form, photo.as_ref()).await? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let page = form_page(&state, None, form, errors).await?;
            return render_invalid(&state, &vc, "Add an article", page).await;
        }
    };

    let photo = store_photo(&state, photo).await?;
    let post = state
        .db
        .create_post(&NewPost {
            title: cleaned.title,
            content: Some(cleaned.content),
            photo,
            is_published: true,
            category_id: cleaned.category_id,
            author_id: Some(user.id),
            tag_ids: cleaned.tag_ids,
        })
        .await?;

    info!("{} published post {} ({})", user.username, post.id, vc.request_id);
    Ok(Redirect::to("/").into_response())
}

pub async fn update_article_form(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let post = load_post(&state, post_id).await?;
    ensure_can_edit(&state, user, &post)?;

    let form = PostForm {
        title: post.title.clone(),
        content: post.content.clone(),
        category: post.category_id.to_string(),
        tags: state
            .db
            .tags_for_post(post_id)
            .await?
            .into_iter()
            .map(|tag| tag.id.to_string())
            .collect(),
    };
    let title = format!("Edit: {}", post.title);
    let page = form_page(&state, Some(post), form, FormErrors::new()).await?;
    render(&state, &vc, title, page).await
}

pub async fn update_article(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let post = load_post(&state, post_id).await?;
    ensure_can_edit(&state, user, &post)?;

    let (form, photo) = read_post_form(multipart).await?;
    let cleaned = match clean_post_form(&state, &form, photo.as_ref()).await? {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let title = format!("Edit: {}", post.title);
            let page = form_page(&state, Some(post), form, errors).await?;
            return render_invalid(&state, &vc, title, page).await;
        }
    };

    let new_photo = store_photo(&state, photo).await?;
    let replaced_photo = new_photo.is_some();
    let previous = state
        .db
        .update_post(
            post_id,
            &PostChanges {
                title: cleaned.title,
                content: cleaned.content,
                photo: new_photo,
                category_id: cleaned.category_id,
                tag_ids: Some(cleaned.tag_ids),
            },
        )
        .await?;

    if replaced_photo {
        if let Some(old) = previous.photo.as_deref() {
            state.media.remove(old).await;
        }
    }

    info!("{} updated post {} ({})", user.username, post_id, vc.request_id);
    Ok(Redirect::to("/").into_response())
}

pub async fn delete_article_form(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let post = load_post(&state, post_id).await?;
    ensure_can_edit(&state, user, &post)?;

    let title = format!("Delete: {}", post.title);
    render(&state, &vc, title, DeletePage { post }).await
}

pub async fn delete_article(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Path(post_id): Path<i64>,
) -> PageResult {
    let user = login_required(&vc, &uri)?;
    let post = load_post(&state, post_id).await?;
    ensure_can_edit(&state, user, &post)?;

    let deleted = state
        .db
        .delete_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
    if let Some(photo) = deleted.photo.as_deref() {
        state.media.remove(photo).await;
    }

    info!("{} deleted post {} ({})", user.username, post_id, vc.request_id);
    Ok(Redirect::to("/").into_response())
}
