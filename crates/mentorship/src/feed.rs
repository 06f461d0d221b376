//! Community feed
//!
//! Two collections over `community_posts`: the public feed of the twenty
//! most recent approved posts, and the user's own posts whatever their
//! moderation state. The two are independent; a post approved after the feed
//! was loaded shows up on the feed's next resync.

use crate::entities::CommunityPost;
use crate::error::{MentorshipError, Result};
use crate::session::Session;
use crate::view::{columns, newest_created, rows, written};
use livesync::{
    CollectionHandle, Entity, Filter, Mutation, Query, RecordId, RemoteCollectionSync,
    RemoteStore, SyncConfig,
};
use serde_json::json;
use std::sync::Arc;

/// Number of posts in the public feed
pub const FEED_SIZE: usize = 20;

pub struct CommunityFeed<S: RemoteStore + 'static> {
    session: Session,
    approved: RemoteCollectionSync<S>,
    mine: RemoteCollectionSync<S>,
}

impl<S: RemoteStore + 'static> CommunityFeed<S> {
    pub fn new(store: Arc<S>, session: Session, config: SyncConfig) -> Self {
        Self {
            approved: RemoteCollectionSync::new(Arc::clone(&store), config.clone()),
            mine: RemoteCollectionSync::new(store, config),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Load the public feed and the user's posts.
    pub async fn start(&self) -> Result<()> {
        let feed = Query::table(CommunityPost::TABLE)
            .filter(Filter::field_eq("is_approved", true))
            .order_by(newest_created())
            .limit(FEED_SIZE);
        let mine = Query::table(CommunityPost::TABLE)
            .filter(self.session.owned_rows())
            .order_by(newest_created());

        self.approved.activate(feed).await?;
        if let Err(e) = self.mine.activate(mine).await {
            self.approved.deactivate();
            return Err(e.into());
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.approved.deactivate();
        self.mine.deactivate();
    }

    pub fn is_loading(&self) -> bool {
        self.approved.is_loading() || self.mine.is_loading()
    }

    /// Approved posts, most recently created first.
    pub fn posts(&self) -> Result<Vec<CommunityPost>> {
        rows(&self.approved)
    }

    /// The user's own posts, most recently created first.
    pub fn my_posts(&self) -> Result<Vec<CommunityPost>> {
        rows(&self.mine)
    }

    pub fn feed_handle(&self) -> Option<CollectionHandle> {
        self.approved.collection()
    }

    pub fn my_posts_handle(&self) -> Option<CollectionHandle> {
        self.mine.collection()
    }

    /// Submit a post for moderation.
    pub async fn publish(&self, content: &str, anonymous: bool) -> Result<CommunityPost> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MentorshipError::InvalidInput("post is empty".to_string()));
        }

        let fields = columns([
            ("content", json!(content)),
            ("is_anonymous", json!(anonymous)),
            ("is_approved", json!(false)),
            ("likes_count", json!(0)),
        ]);
        let mutated = self.mine.mutate(Mutation::insert(fields)).await?;
        written(mutated)
    }

    /// Add a like to a post in the public feed.
    ///
    /// The count is incremented on the store, so likes from other readers
    /// that this feed has not seen yet are kept.
    pub async fn like(&self, post_id: &RecordId) -> Result<CommunityPost> {
        let listed = self
            .approved
            .collection()
            .is_some_and(|feed| feed.contains(post_id));
        if !listed {
            return Err(MentorshipError::PostNotFound(post_id.to_string()));
        }

        let mutated = self
            .approved
            .mutate(Mutation::increment(post_id.clone(), "likes_count", 1))
            .await?;
        written(mutated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync::MemoryStore;

    fn feed() -> CommunityFeed<MemoryStore> {
        CommunityFeed::new(
            Arc::new(MemoryStore::new()),
            Session::new("u-1"),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_published_post_awaits_moderation() {
        let feed = feed();
        feed.start().await.unwrap();

        let post = feed.publish("  Hello from the coding club!  ", true).await.unwrap();
        assert_eq!(post.content, "Hello from the coding club!");
        assert!(!post.is_approved);

        assert_eq!(feed.my_posts().unwrap().len(), 1);
        assert!(feed.posts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_post_rejected() {
        let feed = feed();
        feed.start().await.unwrap();
        assert!(matches!(
            feed.publish("   ", false).await,
            Err(MentorshipError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_like_unknown_post() {
        let feed = feed();
        feed.start().await.unwrap();
        assert_eq!(
            feed.like(&RecordId::new("p-404")).await,
            Err(MentorshipError::PostNotFound("p-404".to_string()))
        );
    }
}
