use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::content::StoreError;
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub next: String,
    pub username: String,
    pub display_name: String,
    pub username_error: Option<String>,
    pub password_error: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Only same-site paths are honoured as a post-login destination.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn signed_in(state: &AppState, user_id: &str, next: &str) -> AppResult<Response> {
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, user_id, hours)?;
    let cookie = session::session_cookie(&state.config.auth.cookie_name, &token, hours);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(next),
    )
        .into_response())
}

// -- Login --

/// GET /auth/login
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer: user.map(|u| u.username),
        next: safe_next(query.next.as_deref()).to_string(),
        username: String::new(),
        error: None,
    })
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    let username = form.username.trim();

    let user = match state.content.user_by_username(username).await {
        Ok(user) => Some(user),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let verified = match user {
        Some(user) => match user.password_hash.clone() {
            Some(hash) => password::verify_password_blocking(form.password.clone(), hash)
                .await
                .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
                .then_some(user),
            None => None,
        },
        None => None,
    };

    let Some(user) = verified else {
        tracing::warn!("Failed login attempt for {:?}", username);
        return Ok(Html(LoginTemplate {
            viewer: None,
            next,
            username: username.to_string(),
            error: Some(BAD_CREDENTIALS.to_string()),
        })
        .into_response());
    };

    tracing::info!("User {} logged in", user.username);
    signed_in(&state, &user.id, &next)
}

// -- Signup --

/// GET /auth/signup
pub async fn signup_page(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer: user.map(|u| u.username),
        next: safe_next(query.next.as_deref()).to_string(),
        username: String::new(),
        display_name: String::new(),
        username_error: None,
        password_error: None,
    })
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    let username = form.username.trim().to_string();
    let display_name = form.display_name.trim().to_string();

    let mut username_error = password::validate_username(&username)
        .err()
        .map(str::to_string);
    let password_error = password::validate_password(&form.password)
        .err()
        .map(str::to_string);

    if username_error.is_none() {
        match state.content.user_by_username(&username).await {
            Ok(_) => username_error = Some(USERNAME_TAKEN.to_string()),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if username_error.is_some() || password_error.is_some() {
        return Ok(Html(SignupTemplate {
            viewer: None,
            next,
            username,
            display_name,
            username_error,
            password_error,
        })
        .into_response());
    }

    let plaintext = form.password;
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    let shown = (!display_name.is_empty()).then_some(display_name.as_str());
    let user = state
        .content
        .create_user(&username, shown, Some(&hash))
        .await?;

    tracing::info!("Registered user {}", user.username);
    signed_in(&state, &user.id, &next)
}

// -- Logout --

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = extract_session_token(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, session::clear_session_cookie(cookie_name))]),
        Redirect::to("/"),
    )
        .into_response())
}
