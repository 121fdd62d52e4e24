//! # Ports
//!
//! Contracts the core needs from the Persistent Store, the Identity Provider
//! and the Content Repository. Any storage adapter must implement these.
//!
//! Infrastructure failures are reported as `anyhow::Error`; the core decides
//! whether they abort the caller's action or are merely logged.

use async_trait::async_trait;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::ids::{CommentId, NotificationId, PostId, UserId};
use crate::models::{
    Comment, Counter, GlobalStatistics, ModerationStatus, Notification, PostSummary, Reaction,
    ReactionChange, ReactionKind, Role, User,
};

/// Result of a version-checked comment write.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentWrite {
    /// Stored; carries the record with its bumped version
    Committed(Comment),
    /// Someone else wrote (or deleted) the record since it was read
    VersionConflict,
}

/// A report counted by the store in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReport {
    pub comment: Comment,
    /// The report pushed an approved comment back to `Pending`
    pub escalated: bool,
}

/// Comment persistence with optimistic concurrency.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, comment: Comment) -> anyhow::Result<()>;
    async fn find(&self, id: CommentId) -> anyhow::Result<Option<Comment>>;
    /// Writes `comment` only if the stored version still equals `comment.version`.
    async fn update(&self, comment: Comment) -> anyhow::Result<CommentWrite>;
    /// Adds one report and, once `escalation_threshold` is reached, returns an
    /// approved comment to `Pending`, without a version check. `None` if absent.
    async fn record_report(&self, id: CommentId, escalation_threshold: u32) -> anyhow::Result<Option<RecordedReport>>;
    /// Adds `delta` to the like count, floored at zero. `None` if absent.
    async fn adjust_likes(&self, id: CommentId, delta: i32) -> anyhow::Result<Option<Comment>>;
    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: CommentId) -> anyhow::Result<bool>;
    async fn list_by_status(&self, status: ModerationStatus, limit: usize) -> anyhow::Result<Vec<Comment>>;
    /// Comments with at least one report, most reported first.
    async fn list_reported(&self, limit: usize) -> anyhow::Result<Vec<Comment>>;
    async fn count(&self) -> anyhow::Result<u64>;
}

/// Reaction persistence keyed by (user, post).
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Check-then-create/update as one atomic step for the pair.
    async fn upsert(&self, user_id: UserId, post_id: PostId, kind: ReactionKind) -> anyhow::Result<ReactionChange>;
    async fn remove(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>>;
    async fn find(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>>;
    async fn count_for_post(&self, post_id: PostId, kind: ReactionKind) -> anyhow::Result<u64>;
    /// Site-wide count, used by recounts.
    async fn count(&self, kind: ReactionKind) -> anyhow::Result<u64>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> anyhow::Result<()>;
    async fn find(&self, id: NotificationId) -> anyhow::Result<Option<Notification>>;
    /// Newest first.
    async fn list_for_recipient(&self, recipient_id: UserId) -> anyhow::Result<Vec<Notification>>;
    async fn mark_read(&self, id: NotificationId) -> anyhow::Result<()>;
    /// Returns how many notifications flipped from unread to read.
    async fn mark_all_read(&self, recipient_id: UserId) -> anyhow::Result<u64>;
    async fn count_unread(&self, recipient_id: UserId) -> anyhow::Result<u64>;
}

/// The single statistics row behind an atomic counter interface.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// `None` until the row has been written once.
    async fn load(&self) -> anyhow::Result<Option<GlobalStatistics>>;
    /// Atomically adds `delta` (floored at zero), creating the row if absent.
    async fn adjust(&self, counter: Counter, delta: i64) -> anyhow::Result<GlobalStatistics>;
    /// Replaces every counter at once.
    async fn store(&self, stats: GlobalStatistics) -> anyhow::Result<()>;
}

/// Identity Provider lookups.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> anyhow::Result<Option<User>>;
    /// At most `limit` users holding `role`; one bounded page, never a scan.
    async fn users_with_role(&self, role: Role, limit: usize) -> anyhow::Result<Vec<User>>;
    async fn count_users(&self) -> anyhow::Result<u64>;
}

/// Content Repository lookups.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait PostDirectory: Send + Sync {
    async fn find_post(&self, id: PostId) -> anyhow::Result<Option<PostSummary>>;
    async fn count_posts(&self) -> anyhow::Result<u64>;
}
