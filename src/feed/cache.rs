use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// The one key the global timeline is cached under. Page number and viewer
/// are not part of it.
pub const TIMELINE_CACHE_KEY: &str = "index_page";

#[derive(Debug, Clone)]
struct CachedRender {
    body: String,
    expires_at: Instant,
}

/// Short-lived cache for the rendered global timeline.
///
/// Entries are never evicted in the background; an expired entry is dropped
/// by the next `get`.
pub struct TimelineCache {
    ttl: Duration,
    entry: Mutex<Option<CachedRender>>,
}

impl TimelineCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, now: Instant) -> Option<String> {
        let mut entry = self.entry.lock().await;
        let fresh = entry.as_ref().is_some_and(|cached| now < cached.expires_at);
        if fresh {
            return entry.as_ref().map(|cached| cached.body.clone());
        }

        // Populated -> Empty happens here, on access
        *entry = None;
        None
    }

    pub async fn put(&self, now: Instant, body: String) {
        let mut entry = self.entry.lock().await;
        *entry = Some(CachedRender {
            body,
            expires_at: now + self.ttl,
        });
    }

    /// Serve the cached body, or render and cache a fresh one.
    ///
    /// Failed renders are returned to the caller and never cached. Concurrent
    /// misses may each render; the last one to finish wins.
    pub async fn get_or_render<F, Fut, E>(&self, now: Instant, render: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(body) = self.get(now).await {
            tracing::debug!("cache hit for {}", TIMELINE_CACHE_KEY);
            return Ok(body);
        }

        tracing::debug!("cache miss for {}", TIMELINE_CACHE_KEY);
        let body = render().await?;
        self.put(now, body.clone()).await;
        Ok(body)
    }
}
