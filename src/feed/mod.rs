pub mod cache;
pub mod composer;
pub mod paginator;

pub use cache::TimelineCache;
pub use composer::{FeedComposer, GroupFeed, PostDetail, ProfileFeed};
pub use paginator::{Page, PageLink, Paginator};
