// Account pages: login, logout, registration and password change

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, Uri},
    response::{AppendHeaders, IntoResponse, Redirect},
    Form,
};
use serde::Serialize;
use tracing::info;

use super::{cleared_session_cookie, login_required, render, render_invalid, session_cookie, PageResult};
use crate::{
    app_state::AppState,
    error::AppError,
    forms::{
        FormErrors, LoginForm, NextParams, PasswordChangeForm, RegistrationForm, NON_FIELD_ERRORS,
    },
    infrastructure::Vc,
    models::NewUser,
};

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Serialize)]
struct LoginPage {
    username: String,
    next: Option<String>,
    errors: FormErrors,
}

#[derive(Serialize)]
struct RegisterPage {
    username: String,
    email: String,
    errors: FormErrors,
}

#[derive(Serialize)]
struct PasswordPage {
    errors: FormErrors,
}

pub async fn login_form(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<NextParams>,
) -> PageResult {
    let page = LoginPage {
        username: String::new(),
        next: params.safe_target().map(str::to_string),
        errors: FormErrors::new(),
    };
    render(&state, &vc, "Log in", page).await
}

pub async fn login(
    State(state): State<AppState>,
    vc: Vc,
    Query(params): Query<NextParams>,
    Form(form): Form<LoginForm>,
) -> PageResult {
    let next = params.safe_target().map(str::to_string);
    let invalid = |username: String, errors: FormErrors| LoginPage {
        username,
        next: next.clone(),
        errors,
    };

    let form = match form.clone().clean() {
        Ok(form) => form,
        Err(errors) => {
            return render_invalid(&state, &vc, "Log in", invalid(form.username, errors)).await;
        }
    };

    let (user, session) = match state.identity.login(&form.username, &form.password).await {
        Ok(opened) => opened,
        Err(AppError::Unauthorized(_)) => {
            let mut errors = FormErrors::new();
            errors.add(NON_FIELD_ERRORS, INVALID_LOGIN);
            return render_invalid(&state, &vc, "Log in", invalid(form.username, errors)).await;
        }
        Err(e) => return Err(e.into()),
    };

    info!("{} signed in ({})", user.username, vc.request_id);
    let cookie = session_cookie(&session.token, &state.config.auth);
    let target = next.as_deref().unwrap_or("/");
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(target)).into_response())
}

pub async fn logout(State(state): State<AppState>, vc: Vc) -> PageResult {
    if let Some(token) = vc.session_token.as_deref() {
        state.identity.logout(token).await?;
    }
    Ok((
        AppendHeaders([(SET_COOKIE, cleared_session_cookie())]),
        Redirect::to("/"),
    )
        .into_response())
}

pub async fn register_form(State(state): State<AppState>, vc: Vc) -> PageResult {
    let page = RegisterPage {
        username: String::new(),
        email: String::new(),
        errors: FormErrors::new(),
    };
    render(&state, &vc, "Register", page).await
}

pub async fn register(
    State(state): State<AppState>,
    vc: Vc,
    Form(form): Form<RegistrationForm>,
) -> PageResult {
    let form = match form.clone().clean() {
        Ok(form) => form,
        Err(errors) => {
            let page = RegisterPage {
                username: form.username,
                email: form.email,
                errors,
            };
            return render_invalid(&state, &vc, "Register", page).await;
        }
    };

    let new_user = NewUser {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password1,
    };
    match state.identity.register(&new_user).await {
        Ok(_) => Ok(Redirect::to("/login/").into_response()),
        Err(AppError::Validation(message)) => {
            let mut errors = FormErrors::new();
            errors.add("username", message);
            let page = RegisterPage {
                username: form.username,
                email: form.email,
                errors,
            };
            render_invalid(&state, &vc, "Register", page).await
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn password_change_form(State(state): State<AppState>, vc: Vc, uri: Uri) -> PageResult {
    login_required(&vc, &uri)?;
    let page = PasswordPage {
        errors: FormErrors::new(),
    };
    render(&state, &vc, "Change password", page).await
}

pub async fn password_change(
    State(state): State<AppState>,
    vc: Vc,
    uri: Uri,
    Form(form): Form<PasswordChangeForm>,
) -> PageResult {
    let user = login_required(&vc, &uri)?;

    let form = match form.clean() {
        Ok(form) => form,
        Err(errors) => {
            return render_invalid(&state, &vc, "Change password", PasswordPage { errors }).await;
        }
    };

    match state
        .identity
        .change_password(user.id, &form.old_password, &form.new_password1)
        .await
    {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(AppError::Validation(message)) => {
            let mut errors = FormErrors::new();
            errors.add("old_password", message);
            render_invalid(&state, &vc, "Change password", PasswordPage { errors }).await
        }
        Err(e) => Err(e.into()),
    }
}
