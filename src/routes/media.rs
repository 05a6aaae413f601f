use std::io::ErrorKind;

use axum::extract::{Path, State};
use axum::response::Response;

use crate::error::{AppError, AppResult};
use crate::routes::assets::file_response;
use crate::state::AppState;

/// GET /media/{*path}: uploaded post images.
pub async fn serve(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let file = state.media.resolve(&path).ok_or(AppError::NotFound)?;

    match tokio::fs::read(&file).await {
        Ok(data) => Ok(file_response(&path, data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound),
        Err(e) => Err(AppError::Internal(format!("Reading {}: {}", path, e))),
    }
}
