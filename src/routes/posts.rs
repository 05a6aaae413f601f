use askama::Template;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use std::future::Future;

use crate::content::{NewPost, PostChanges, StoreError};
use crate::db::models::{Comment, Group, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::{CommentForm, FormErrors, PostSubmission, Upload};
use crate::media::MediaStore;
use crate::routes::home::Html;
use crate::routes::profiles::profile_path;
use crate::state::AppState;

/// Upper bound on a post form body, image included.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<String>,
    pub post: Post,
    pub author_post_count: usize,
    pub comments: Vec<Comment>,
    pub can_edit: bool,
    pub comment_text: String,
    pub comment_error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub viewer: Option<String>,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub selected_group: String,
    pub groups: Vec<Group>,
    pub errors: FormErrors,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", get(create_page).post(create))
        .route("/posts/{id}", get(detail))
        .route("/posts/{id}/edit", get(edit_page).post(edit))
        .route("/posts/{id}/comment", get(comment_page).post(comment))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn post_path(id: i64) -> String {
    format!("/posts/{}", id)
}

/// Post ids in paths that are not integers name no post.
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

async fn read_submission(mut multipart: Multipart) -> AppResult<PostSubmission> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => submission.text = field.text().await.map_err(bad_multipart)?,
            "group" => submission.group = field.text().await.map_err(bad_multipart)?,
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                // Browsers send an empty, unnamed part when no file was chosen
                if !filename.is_empty() || !data.is_empty() {
                    submission.image = Some(Upload {
                        filename,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

/// Store the upload, if any, then run `write` with its reference.
/// A failed write deletes the stored file again.
async fn write_with_image<T, F, Fut>(
    media: &MediaStore,
    upload: Option<&Upload>,
    write: F,
) -> AppResult<T>
where
    F: FnOnce(Option<String>) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let reference = match upload {
        Some(upload) => Some(media.save_post_image(&upload.filename, &upload.data).await?),
        None => None,
    };

    match write(reference.clone()).await {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Some(reference) = reference {
                if let Err(cleanup) = media.remove(&reference).await {
                    tracing::warn!("Could not remove orphaned image {}: {}", reference, cleanup);
                }
            }
            Err(e.into())
        }
    }
}

async fn render_detail(
    state: &AppState,
    viewer: Option<CurrentUser>,
    post_id: i64,
    comment_text: String,
    comment_error: Option<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let detail = state.feed.post_detail(post_id).await?;
    let can_edit = viewer
        .as_ref()
        .is_some_and(|v| v.id == detail.post.author.id);

    Ok(Html(PostDetailTemplate {
        viewer: viewer.map(|u| u.username),
        post: detail.post,
        author_post_count: detail.author_post_count,
        comments: detail.comments,
        can_edit,
        comment_text,
        comment_error,
    }))
}

/// GET /posts/{id}
pub async fn detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostDetailTemplate>> {
    let post_id = parse_post_id(&id)?;
    render_detail(&state, user, post_id, String::new(), None).await
}

/// GET /posts/{id}/comment
///
/// Reached after signing in from the comment form; the text was not kept.
pub async fn comment_page(_user: CurrentUser, Path(id): Path<String>) -> AppResult<Redirect> {
    let post_id = parse_post_id(&id)?;
    Ok(Redirect::to(&post_path(post_id)))
}

/// POST /posts/{id}/comment
pub async fn comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            let page = render_detail(&state, Some(user), post_id, form.text, errors.text).await?;
            return Ok(page.into_response());
        }
    };

    state.content.add_comment(post_id, &user.id, &text).await?;
    tracing::info!("{} commented on post {}", user.username, post_id);

    Ok(Redirect::to(&post_path(post_id)).into_response())
}

/// GET /create
pub async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<PostFormTemplate>> {
    let groups = state.content.list_groups().await?;

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: false,
        action: "/create".to_string(),
        text: String::new(),
        selected_group: String::new(),
        groups,
        errors: FormErrors::default(),
    }))
}

/// POST /create
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let submission = read_submission(multipart).await?;
    let groups = state.content.list_groups().await?;

    let valid = match submission.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: false,
                action: "/create".to_string(),
                text: submission.text.clone(),
                selected_group: submission.group.clone(),
                groups,
                errors,
            })
            .into_response());
        }
    };

    let author_id = user.id.clone();
    let post = write_with_image(&state.media, valid.image, |image| {
        state.content.create_post(NewPost {
            author_id,
            text: valid.text,
            group_id: valid.group_id,
            image,
        })
    })
    .await?;
    tracing::info!("{} published post {}", user.username, post.id);

    Ok(Redirect::to(&profile_path(&user.username)).into_response())
}

/// GET /posts/{id}/edit
pub async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Html<PostFormTemplate>> {
    let post_id = parse_post_id(&id)?;
    let post = state.content.post_by_id(post_id).await?;
    let groups = state.content.list_groups().await?;

    Ok(Html(PostFormTemplate {
        viewer: Some(user.username),
        is_edit: true,
        action: format!("{}/edit", post_path(post.id)),
        text: post.text,
        selected_group: post.group.map(|g| g.slug).unwrap_or_default(),
        groups,
        errors: FormErrors::default(),
    }))
}

/// POST /posts/{id}/edit
///
/// Any signed-in user may edit any post; there is no ownership check.
pub async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    // 404 before reading the body
    state.content.post_by_id(post_id).await?;

    let submission = read_submission(multipart).await?;
    let groups = state.content.list_groups().await?;

    let valid = match submission.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(PostFormTemplate {
                viewer: Some(user.username),
                is_edit: true,
                action: format!("{}/edit", post_path(post_id)),
                text: submission.text.clone(),
                selected_group: submission.group.clone(),
                groups,
                errors,
            })
            .into_response());
        }
    };

    write_with_image(&state.media, valid.image, |image| {
        state.content.update_post(
            post_id,
            PostChanges {
                text: valid.text,
                group_id: valid.group_id,
                image,
            },
        )
    })
    .await?;
    tracing::info!("{} edited post {}", user.username, post_id);

    Ok(Redirect::to(&post_path(post_id)).into_response())
}
