use askama::Template;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;

use crate::db::models::Post;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::feed::Page;
use crate::routes::home::{Html, PageQuery};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<String>,
    pub page: Page<Post>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/follow", get(follow_index))
}

/// GET /follow: posts by every author the viewer follows.
pub async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<FollowTemplate>> {
    let page = state
        .feed
        .follow_feed(&user.to_ref(), query.page.as_deref())
        .await?;

    Ok(Html(FollowTemplate {
        viewer: Some(user.username),
        page,
    }))
}
