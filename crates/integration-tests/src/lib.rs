//! Shared fixtures for the end-to-end scenarios: the full core wired to the
//! in-memory store, plus a few ports that misbehave on purpose.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::{
    Comment, CommentId, CommentRepository, CommentWrite, Counter, GlobalStatistics, ModerationStatus, Notification,
    NotificationId, NotificationRepository, PostId, PostSummary, RecordedReport, Role, StatisticsRepository, User,
    UserId,
};
use services::{EngagementCore, EngagementPolicy, Ports};
use storage_adapters::InMemoryStore;

pub struct World {
    pub store: InMemoryStore,
    pub core: EngagementCore,
}

impl World {
    pub fn new() -> Self {
        Self::with_policy(EngagementPolicy::default())
    }

    pub fn with_policy(policy: EngagementPolicy) -> Self {
        let store = InMemoryStore::new();
        let ports = in_memory_ports(&store);
        Self::assemble(store, ports, policy)
    }

    /// Lets a test swap individual ports before the core is built.
    pub fn assemble(store: InMemoryStore, ports: Ports, policy: EngagementPolicy) -> Self {
        Self {
            store,
            core: EngagementCore::new(ports, policy),
        }
    }

    pub fn user(&self, username: &str, roles: &[Role]) -> User {
        let user = User::new(username, roles.to_vec());
        self.store.directory.add_user(user.clone());
        user
    }

    pub fn member(&self, username: &str) -> User {
        self.user(username, &[Role::User])
    }

    pub fn moderator(&self, username: &str) -> User {
        self.user(username, &[Role::User, Role::Moderator])
    }

    pub fn post(&self, author: &User, title: &str) -> PostSummary {
        let post = PostSummary {
            id: PostId::new(),
            title: title.to_string(),
            author_id: author.id,
        };
        self.store.directory.add_post(post.clone());
        post
    }

    pub async fn comment(&self, post: &PostSummary, author: &User, content: &str) -> Comment {
        self.core
            .comments
            .create(post.id, author.id, content, None)
            .await
            .expect("comment creation must succeed")
    }

    pub async fn inbox(&self, user: &User) -> Vec<Notification> {
        self.core
            .notifications
            .inbox(user.id)
            .await
            .expect("inbox must load")
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

pub fn in_memory_ports(store: &InMemoryStore) -> Ports {
    Ports {
        comments: store.comments.clone(),
        reactions: store.reactions.clone(),
        notifications: store.notifications.clone(),
        statistics: store.statistics.clone(),
        users: store.directory.clone(),
        posts: store.directory.clone(),
    }
}

/// Notification store that refuses every write.
pub struct UnreachableNotifications;

#[async_trait]
impl NotificationRepository for UnreachableNotifications {
    async fn insert(&self, _: Notification) -> anyhow::Result<()> {
        anyhow::bail!("notification store unreachable")
    }

    async fn find(&self, _: NotificationId) -> anyhow::Result<Option<Notification>> {
        anyhow::bail!("notification store unreachable")
    }

    async fn list_for_recipient(&self, _: UserId) -> anyhow::Result<Vec<Notification>> {
        anyhow::bail!("notification store unreachable")
    }

    async fn mark_read(&self, _: NotificationId) -> anyhow::Result<()> {
        anyhow::bail!("notification store unreachable")
    }

    async fn mark_all_read(&self, _: UserId) -> anyhow::Result<u64> {
        anyhow::bail!("notification store unreachable")
    }

    async fn count_unread(&self, _: UserId) -> anyhow::Result<u64> {
        anyhow::bail!("notification store unreachable")
    }
}

/// Statistics store whose counter writes never complete. Reads and
/// wholesale stores go through to the wrapped store.
pub struct StalledStatistics(pub Arc<dyn StatisticsRepository>);

#[async_trait]
impl StatisticsRepository for StalledStatistics {
    async fn load(&self) -> anyhow::Result<Option<GlobalStatistics>> {
        self.0.load().await
    }

    async fn adjust(&self, _: Counter, _: i64) -> anyhow::Result<GlobalStatistics> {
        std::future::pending().await
    }

    async fn store(&self, stats: GlobalStatistics) -> anyhow::Result<()> {
        self.0.store(stats).await
    }
}

/// Comment store that waits `delay` before every call, so concurrent
/// writers to one comment actually interleave.
pub struct SluggishComments {
    pub inner: Arc<dyn CommentRepository>,
    pub delay: Duration,
}

impl SluggishComments {
    async fn lag(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl CommentRepository for SluggishComments {
    async fn insert(&self, comment: Comment) -> anyhow::Result<()> {
        self.lag().await;
        self.inner.insert(comment).await
    }

    async fn find(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        self.lag().await;
        self.inner.find(id).await
    }

    async fn update(&self, comment: Comment) -> anyhow::Result<CommentWrite> {
        self.lag().await;
        self.inner.update(comment).await
    }

    async fn record_report(&self, id: CommentId, escalation_threshold: u32) -> anyhow::Result<Option<RecordedReport>> {
        self.lag().await;
        self.inner.record_report(id, escalation_threshold).await
    }

    async fn adjust_likes(&self, id: CommentId, delta: i32) -> anyhow::Result<Option<Comment>> {
        self.lag().await;
        self.inner.adjust_likes(id, delta).await
    }

    async fn delete(&self, id: CommentId) -> anyhow::Result<bool> {
        self.lag().await;
        self.inner.delete(id).await
    }

    async fn list_by_status(&self, status: ModerationStatus, limit: usize) -> anyhow::Result<Vec<Comment>> {
        self.inner.list_by_status(status, limit).await
    }

    async fn list_reported(&self, limit: usize) -> anyhow::Result<Vec<Comment>> {
        self.inner.list_reported(limit).await
    }

    async fn count(&self) -> anyhow::Result<u64> {
        self.inner.count().await
    }
}

/// Notification store whose inserts take `delay` to land. Reads go
/// straight through.
pub struct SlowNotifications {
    pub inner: Arc<dyn NotificationRepository>,
    pub delay: Duration,
}

#[async_trait]
impl NotificationRepository for SlowNotifications {
    async fn insert(&self, notification: Notification) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(notification).await
    }

    async fn find(&self, id: NotificationId) -> anyhow::Result<Option<Notification>> {
        self.inner.find(id).await
    }

    async fn list_for_recipient(&self, recipient_id: UserId) -> anyhow::Result<Vec<Notification>> {
        self.inner.list_for_recipient(recipient_id).await
    }

    async fn mark_read(&self, id: NotificationId) -> anyhow::Result<()> {
        self.inner.mark_read(id).await
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        self.inner.mark_all_read(recipient_id).await
    }

    async fn count_unread(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        self.inner.count_unread(recipient_id).await
    }
}
