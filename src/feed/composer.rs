use crate::content::{DynContentRepository, Scope, StoreError};
use crate::db::models::{Comment, Group, Post, User, UserRef};
use crate::feed::paginator::{Page, Paginator};
use crate::follow::DynFollowGraph;

pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

pub struct ProfileFeed {
    pub author: User,
    pub page: Page<Post>,
    /// Every post by the author, not just this page.
    pub post_count: usize,
    pub following: bool,
}

pub struct PostDetail {
    pub post: Post,
    pub author_post_count: usize,
    pub comments: Vec<Comment>,
}

/// Turns a scope and a raw page number into a page of posts plus whatever
/// counts that view shows.
#[derive(Clone)]
pub struct FeedComposer {
    content: DynContentRepository,
    follows: DynFollowGraph,
    page_size: usize,
}

impl FeedComposer {
    pub fn new(content: DynContentRepository, follows: DynFollowGraph, page_size: usize) -> Self {
        Self {
            content,
            follows,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn page(
        &self,
        scope: &Scope,
        requested: Option<&str>,
    ) -> Result<Page<Post>, StoreError> {
        let page_size = self.page_size;
        let pick = |count: usize| {
            let paginator = Paginator::new(count, page_size);
            paginator.window(paginator.resolve(requested))
        };
        let (count, items) = self.content.scope_window(scope, &pick).await?;

        let paginator = Paginator::new(count, page_size);
        let number = paginator.resolve(requested);
        Ok(Page::new(items, number, &paginator))
    }

    pub async fn timeline(&self, requested: Option<&str>) -> Result<Page<Post>, StoreError> {
        self.page(&Scope::All, requested).await
    }

    pub async fn group(&self, slug: &str, requested: Option<&str>) -> Result<GroupFeed, StoreError> {
        let group = self.content.group_by_slug(slug).await?;
        let page = self
            .page(&Scope::ByGroup(group.slug.clone()), requested)
            .await?;

        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRef>,
        requested: Option<&str>,
    ) -> Result<ProfileFeed, StoreError> {
        let author = self.content.user_by_username(username).await?;
        let author_ref = author.to_ref();

        let following = self.follows.is_following(viewer, &author_ref).await?;
        let page = self
            .page(&Scope::ByAuthor(author.id.clone()), requested)
            .await?;
        let post_count = self.content.post_count_for_author(&author.id).await?;

        Ok(ProfileFeed {
            author,
            page,
            post_count,
            following,
        })
    }

    /// Posts by everyone `viewer` follows, merged into one timeline.
    pub async fn follow_feed(
        &self,
        viewer: &UserRef,
        requested: Option<&str>,
    ) -> Result<Page<Post>, StoreError> {
        self.page(&Scope::ByFollowedAuthors(viewer.id.clone()), requested)
            .await
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, StoreError> {
        let post = self.content.post_by_id(post_id).await?;
        let author_post_count = self.content.post_count_for_author(&post.author.id).await?;
        let comments = self.content.comments_for(post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }
}
