use std::time::Instant;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::feed::Page;
use crate::state::AppState;

/// `?page=` as sent; the paginator decides what it means.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Global timeline body, rendered once per cache window.
#[derive(Template)]
#[template(path = "components/timeline.html")]
pub struct TimelineFragment {
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub timeline: String,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<IndexTemplate>> {
    let feed = state.feed.clone();
    let requested = query.page;

    let timeline = state
        .timeline_cache
        .get_or_render(Instant::now(), || async move {
            let page = feed
                .timeline(requested.as_deref())
                .await
                .map_err(AppError::from)?;
            TimelineFragment { page }
                .render()
                .map_err(|e| AppError::Internal(format!("Timeline render failed: {}", e)))
        })
        .await?;

    Ok(Html(IndexTemplate {
        viewer: user.map(|u| u.username),
        timeline,
    }))
}
