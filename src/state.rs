use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::content::{DynContentRepository, SqliteContentRepository};
use crate::feed::{FeedComposer, TimelineCache};
use crate::follow::{DynFollowGraph, SqliteFollowGraph};
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub content: DynContentRepository,
    pub follows: DynFollowGraph,
    pub feed: FeedComposer,
    pub timeline_cache: Arc<TimelineCache>,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let content: DynContentRepository = Arc::new(SqliteContentRepository::new(db.clone()));
        let follows: DynFollowGraph = Arc::new(SqliteFollowGraph::new(db.clone()));
        let feed = FeedComposer::new(content.clone(), follows.clone(), config.feed.page_size);
        let timeline_cache = Arc::new(TimelineCache::new(Duration::from_secs(
            config.feed.timeline_cache_secs,
        )));
        let media = MediaStore::new(config.media_path());

        Self {
            db,
            config,
            content,
            follows,
            feed,
            timeline_cache,
            media,
        }
    }
}
