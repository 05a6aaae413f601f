use askama::Template;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;

use crate::db::models::{Group, Post};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::feed::Page;
use crate::routes::home::{Html, PageQuery};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/group.html")]
pub struct GroupTemplate {
    pub viewer: Option<String>,
    pub group: Group,
    pub page: Page<Post>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/group/{slug}", get(group_posts))
}

/// GET /group/{slug}
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<GroupTemplate>> {
    let feed = state.feed.group(&slug, query.page.as_deref()).await?;

    Ok(Html(GroupTemplate {
        viewer: user.map(|u| u.username),
        group: feed.group,
        page: feed.page,
    }))
}
