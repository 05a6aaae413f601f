pub mod assets;
pub mod auth;
pub mod follow;
pub mod groups;
pub mod home;
pub mod media;
pub mod posts;
pub mod profiles;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Every page and form endpoint, with request tracing. Unknown paths are 404.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/media/{*path}", get(media::serve))
        .merge(auth::router())
        .merge(groups::router())
        .merge(profiles::router())
        .merge(posts::router())
        .merge(follow::router())
        .fallback(|| async { AppError::NotFound })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
