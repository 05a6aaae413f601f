//! Durable posts, groups, comments and the users that author them.

pub mod repository;

pub use repository::{ContentRepository, DynContentRepository, SqliteContentRepository};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Which posts a feed request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every post on the site.
    All,
    /// Posts filed under the group with this slug.
    ByGroup(String),
    /// Posts written by the user with this id.
    ByAuthor(String),
    /// Posts written by anyone the user with this id follows.
    ByFollowedAuthors(String),
}

/// A contiguous slice of an ordered post sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

impl Window {
    pub fn everything() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

pub struct NewPost {
    pub author_id: String,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    /// `None` keeps the current image.
    pub image: Option<String>,
}
