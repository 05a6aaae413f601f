//! Follower -> author relation.
//!
//! `follow` quietly ignores self-follows and repeats, while `unfollow` of a
//! relation that does not exist is a `NotFound` error.

use async_trait::async_trait;
use rusqlite::params;
use std::sync::Arc;

use crate::content::StoreError;
use crate::db::models::UserRef;
use crate::state::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    SelfUnfollow,
}

#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Anonymous viewers (`None`) follow nobody.
    async fn is_following(
        &self,
        follower: Option<&UserRef>,
        author: &UserRef,
    ) -> Result<bool, StoreError>;

    async fn follow(&self, follower: &UserRef, author: &UserRef)
        -> Result<FollowOutcome, StoreError>;

    async fn unfollow(
        &self,
        follower: &UserRef,
        author: &UserRef,
    ) -> Result<UnfollowOutcome, StoreError>;
}

pub type DynFollowGraph = Arc<dyn FollowGraph>;

pub struct SqliteFollowGraph {
    pool: DbPool,
}

impl SqliteFollowGraph {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowGraph for SqliteFollowGraph {
    async fn is_following(
        &self,
        follower: Option<&UserRef>,
        author: &UserRef,
    ) -> Result<bool, StoreError> {
        let Some(follower) = follower else {
            return Ok(false);
        };

        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND author_id = ?2",
            params![follower.id, author.id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    async fn follow(
        &self,
        follower: &UserRef,
        author: &UserRef,
    ) -> Result<FollowOutcome, StoreError> {
        if follower.id == author.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let conn = self.pool.get()?;
        // UNIQUE(follower_id, author_id) turns a repeat into a no-op
        let rows = conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, author_id) VALUES (?1, ?2)",
            params![follower.id, author.id],
        )?;

        if rows == 0 {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        tracing::info!("{} now follows {}", follower.username, author.username);
        Ok(FollowOutcome::Followed)
    }

    async fn unfollow(
        &self,
        follower: &UserRef,
        author: &UserRef,
    ) -> Result<UnfollowOutcome, StoreError> {
        if follower.id == author.id {
            return Ok(UnfollowOutcome::SelfUnfollow);
        }

        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND author_id = ?2",
            params![follower.id, author.id],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!(
                "{} does not follow {}",
                follower.username, author.username
            )));
        }

        tracing::info!("{} unfollowed {}", follower.username, author.username);
        Ok(UnfollowOutcome::Unfollowed)
    }
}
