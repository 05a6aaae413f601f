// Repository pattern - isolates all content database side effects
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::content::{NewPost, PostChanges, Scope, StoreError, Window};
use crate::db::models::{Comment, Group, GroupRef, Post, User, UserRef};
use crate::db::TIMESTAMP_FORMAT;
use crate::state::DbPool;

/// Content store - posts, groups, comments and their authors
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError>;

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError>;

    async fn create_group(
        &self,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<Group, StoreError>;

    async fn group_by_slug(&self, slug: &str) -> Result<Group, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    /// Replace text and group, optionally the image, and stamp the edit time
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, StoreError>;

    /// Delete a post; its comments go with it
    async fn delete_post(&self, id: i64) -> Result<(), StoreError>;

    async fn post_by_id(&self, id: i64) -> Result<Post, StoreError>;

    /// Count the posts a scope selects, then read the window `pick` chooses
    /// for that count, newest first with ties broken by id descending.
    /// Both reads see the same snapshot.
    async fn scope_window(
        &self,
        scope: &Scope,
        pick: &(dyn Fn(usize) -> Window + Send + Sync),
    ) -> Result<(usize, Vec<Post>), StoreError>;

    /// Comments on a post in the order they were written
    async fn comments_for(&self, post_id: i64) -> Result<Vec<Comment>, StoreError>;

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: &str,
        text: &str,
    ) -> Result<Comment, StoreError>;

    async fn post_count_for_author(&self, author_id: &str) -> Result<usize, StoreError>;
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynContentRepository = Arc<dyn ContentRepository>;

/// SQLite implementation
pub struct SqliteContentRepository {
    pool: DbPool,
}

impl SqliteContentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.edited_at, p.image,
        u.id, u.username, g.slug, g.title
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

const TIMELINE_ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

/// WHERE clause for a scope plus the single value it binds, if any.
fn scope_filter(scope: &Scope) -> (&'static str, Option<&str>) {
    match scope {
        Scope::All => ("1 = 1", None),
        Scope::ByGroup(slug) => ("g.slug = ?", Some(slug.as_str())),
        Scope::ByAuthor(author_id) => ("p.author_id = ?", Some(author_id.as_str())),
        Scope::ByFollowedAuthors(follower_id) => (
            "p.author_id IN (SELECT f.author_id FROM follows f WHERE f.follower_id = ?)",
            Some(follower_id.as_str()),
        ),
    }
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group = match (
        row.get::<_, Option<String>>(7)?,
        row.get::<_, Option<String>>(8)?,
    ) {
        (Some(slug), Some(title)) => Some(GroupRef { slug, title }),
        _ => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: timestamp_at(row, 2)?,
        edited_at: optional_timestamp_at(row, 3)?,
        image: row.get(4)?,
        author: UserRef {
            id: row.get(5)?,
            username: row.get(6)?,
        },
        group,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        text: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
        author: UserRef {
            id: row.get(4)?,
            username: row.get(5)?,
        },
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
    })
}

fn load_post(conn: &Connection, id: i64) -> Result<Post, StoreError> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", POST_SELECT),
        params![id],
        post_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("post {}", id)))
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn count_scope(conn: &Connection, scope: &Scope) -> Result<usize, StoreError> {
    let (filter, arg) = scope_filter(scope);

    let sql = format!(
        "SELECT COUNT(*) FROM posts p
         LEFT JOIN post_groups g ON g.id = p.group_id
         WHERE {}",
        filter
    );
    let args: Vec<Value> = arg.map(|a| Value::Text(a.to_string())).into_iter().collect();
    let count: i64 = conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;

    Ok(count as usize)
}

fn read_scope(conn: &Connection, scope: &Scope, window: Window) -> Result<Vec<Post>, StoreError> {
    let (filter, arg) = scope_filter(scope);

    let sql = format!(
        "{} WHERE {} {} LIMIT ? OFFSET ?",
        POST_SELECT, filter, TIMELINE_ORDER
    );
    let mut args: Vec<Value> = arg.map(|a| Value::Text(a.to_string())).into_iter().collect();
    args.push(Value::Integer(to_sql_int(window.limit)));
    args.push(Value::Integer(to_sql_int(window.offset)));

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(args.iter()), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(posts)
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO users (id, username, display_name, password_hash) VALUES (?1, ?2, ?3, ?4)",
            params![id, username, display_name, password_hash],
        )?;

        drop(conn);
        self.user_by_username(username).await
    }

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let conn = self.pool.get()?;

        conn.query_row(
            "SELECT id, username, display_name, password_hash, created_at
             FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    display_name: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("user {}", username)))
    }

    async fn create_group(
        &self,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<Group, StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO post_groups (slug, title, description) VALUES (?1, ?2, ?3)",
            params![slug, title, description],
        )?;

        Ok(Group {
            id: conn.last_insert_rowid(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Group, StoreError> {
        let conn = self.pool.get()?;

        conn.query_row(
            "SELECT id, slug, title, description FROM post_groups WHERE slug = ?1",
            params![slug],
            group_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("group {}", slug)))
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt =
            conn.prepare("SELECT id, slug, title, description FROM post_groups ORDER BY title")?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO posts (author_id, group_id, text, image) VALUES (?1, ?2, ?3, ?4)",
            params![post.author_id, post.group_id, post.text, post.image],
        )?;

        load_post(&conn, conn.last_insert_rowid())
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE posts SET
               text = ?1,
               group_id = ?2,
               image = COALESCE(?3, image),
               edited_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE id = ?4",
            params![changes.text, changes.group_id, changes.image, id],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("post {}", id)));
        }

        load_post(&conn, id)
    }

    async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("post {}", id)));
        }

        Ok(())
    }

    async fn post_by_id(&self, id: i64) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;
        load_post(&conn, id)
    }

    async fn scope_window(
        &self,
        scope: &Scope,
        pick: &(dyn Fn(usize) -> Window + Send + Sync),
    ) -> Result<(usize, Vec<Post>), StoreError> {
        let conn = self.pool.get()?;

        // Count and window share one read transaction
        conn.execute("BEGIN", [])?;

        let result: Result<(usize, Vec<Post>), StoreError> = (|| {
            let count = count_scope(&conn, scope)?;
            let posts = read_scope(&conn, scope, pick(count))?;
            Ok((count, posts))
        })();

        match result {
            Ok(found) => {
                conn.execute("COMMIT", [])?;
                Ok(found)
            }
            Err(e) => {
                conn.execute("ROLLBACK", [])?;
                Err(e)
            }
        }
    }

    async fn comments_for(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.text, c.created_at, u.id, u.username
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.id ASC",
        )?;
        let comments = stmt
            .query_map(params![post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: &str,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let conn = self.pool.get()?;

        // Existence check and insert commit together
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<i64, StoreError> = (|| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("post {}", post_id)));
            }

            conn.execute(
                "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
                params![post_id, author_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })();

        let comment_id = match result {
            Ok(id) => {
                conn.execute("COMMIT", [])?;
                id
            }
            Err(e) => {
                conn.execute("ROLLBACK", [])?;
                return Err(e);
            }
        };

        let comment = conn.query_row(
            "SELECT c.id, c.post_id, c.text, c.created_at, u.id, u.username
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.id = ?1",
            params![comment_id],
            comment_from_row,
        )?;

        Ok(comment)
    }

    async fn post_count_for_author(&self, author_id: &str) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }
}
