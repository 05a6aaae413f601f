use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;

use crate::db::models::{Post, User};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed::Page;
use crate::follow::{FollowOutcome, UnfollowOutcome};
use crate::routes::home::{Html, PageQuery};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<String>,
    pub author: User,
    pub page: Page<Post>,
    pub post_count: usize,
    pub following: bool,
    /// Signed in and looking at someone else's profile.
    pub can_follow: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/{username}", get(profile))
        // GET as well, for the redirect back from the login form
        .route("/profile/{username}/follow", get(follow).post(follow))
        .route("/profile/{username}/unfollow", get(unfollow).post(unfollow))
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{}", username)
}

/// GET /profile/{username}
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<ProfileTemplate>> {
    let viewer = user.as_ref().map(CurrentUser::to_ref);
    let feed = state
        .feed
        .profile(&username, viewer.as_ref(), query.page.as_deref())
        .await?;

    let can_follow = viewer.as_ref().is_some_and(|v| v.id != feed.author.id);

    Ok(Html(ProfileTemplate {
        viewer: user.map(|u| u.username),
        author: feed.author,
        page: feed.page,
        post_count: feed.post_count,
        following: feed.following,
        can_follow,
    }))
}

/// GET or POST /profile/{username}/follow
pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state.content.user_by_username(&username).await?.to_ref();
    let outcome = state.follows.follow(&user.to_ref(), &author).await?;

    let target = match outcome {
        FollowOutcome::Followed => profile_path(&author.username),
        FollowOutcome::AlreadyFollowing | FollowOutcome::SelfFollow => {
            profile_path(&user.username)
        }
    };

    Ok(Redirect::to(&target))
}

/// GET or POST /profile/{username}/unfollow
pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state.content.user_by_username(&username).await?.to_ref();
    let outcome = state.follows.unfollow(&user.to_ref(), &author).await?;

    let target = match outcome {
        UnfollowOutcome::Unfollowed => profile_path(&author.username),
        UnfollowOutcome::SelfUnfollow => profile_path(&user.username),
    };

    Ok(Redirect::to(&target))
}
