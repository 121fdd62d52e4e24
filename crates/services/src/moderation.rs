//! # ModerationEngine
//!
//! The comment moderation state machine:
//!
//! ```text
//!   PENDING ──approve──▶ APPROVED ──(reports ≥ threshold)──▶ PENDING
//!      │  ╲                 ▲
//!      │   reject/spam      │ approve/reject/spam from any state
//!      ▼                    │
//!   REJECTED / SPAM ────────┘
//! ```
//!
//! Moderator decisions are accepted from any current status. Reports are not
//! deduplicated per reporter; every call counts.
//!
//! Each operation authorizes, commits the comment, then notifies. Nothing
//! that happens after the commit can fail the operation.

use std::sync::Arc;

use domains::{
    Comment, CommentId, CommentRepository, DomainError, ModerationStatus, Notice, PostDirectory,
    PostSummary, RecordedReport, Role, User, UserDirectory, UserId,
};
use tracing::{info, instrument, warn};

use crate::notices;
use crate::notifications::NotificationDispatcher;
use crate::policy::EngagementPolicy;
use crate::support::{best_effort, mutate_comment, required_reason};

/// Reason recorded on comments flagged as spam.
pub const SPAM_REASON: &str = "Spam detected";

pub struct ModerationEngine {
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: EngagementPolicy,
}

impl ModerationEngine {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: EngagementPolicy,
    ) -> Self {
        Self {
            comments,
            users,
            posts,
            dispatcher,
            policy,
        }
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, comment_id: CommentId, moderator_id: UserId) -> domains::Result<Comment> {
        let comment = self
            .decide(comment_id, moderator_id, ModerationStatus::Approved, None)
            .await?;

        if let Some(post) = self.post_of(&comment).await {
            self.dispatcher
                .notify(comment.author_id, &notices::comment_approved(&post))
                .await;
        }
        Ok(comment)
    }

    /// `reason` is mandatory and bounded by the policy's reason length.
    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        comment_id: CommentId,
        moderator_id: UserId,
        reason: &str,
    ) -> domains::Result<Comment> {
        let reason = required_reason(reason, self.policy.max_reason_length)?;
        let comment = self
            .decide(comment_id, moderator_id, ModerationStatus::Rejected, Some(reason.clone()))
            .await?;

        if let Some(post) = self.post_of(&comment).await {
            self.dispatcher
                .notify(comment.author_id, &notices::comment_rejected(&post, &reason))
                .await;
        }
        Ok(comment)
    }

    /// Spam authors are deliberately not told.
    #[instrument(skip(self))]
    pub async fn mark_spam(&self, comment_id: CommentId, moderator_id: UserId) -> domains::Result<Comment> {
        self.decide(
            comment_id,
            moderator_id,
            ModerationStatus::Spam,
            Some(SPAM_REASON.to_string()),
        )
        .await
    }

    /// Open to any user. Sends an approved comment back to review once it
    /// collects enough reports, then alerts one page of moderators.
    #[instrument(skip(self))]
    pub async fn report(
        &self,
        comment_id: CommentId,
        reporter_id: UserId,
        reason: &str,
    ) -> domains::Result<Comment> {
        let reason = required_reason(reason, self.policy.max_reason_length)?;
        let RecordedReport { comment, escalated } = self
            .comments
            .record_report(comment_id, self.policy.report_escalation_threshold)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", comment_id))?;

        info!(report_count = comment.report_count, "comment reported");
        if escalated {
            info!(report_count = comment.report_count, "approved comment returned to review");
        }

        self.alert_moderators(&comment, &reason).await;
        Ok(comment)
    }

    pub async fn pending_queue(&self, limit: usize) -> domains::Result<Vec<Comment>> {
        Ok(self.comments.list_by_status(ModerationStatus::Pending, limit).await?)
    }

    /// Most reported first.
    pub async fn reported_queue(&self, limit: usize) -> domains::Result<Vec<Comment>> {
        Ok(self.comments.list_reported(limit).await?)
    }

    /// Shared path of approve/reject/spam: authorize, then commit.
    async fn decide(
        &self,
        comment_id: CommentId,
        moderator_id: UserId,
        status: ModerationStatus,
        reason: Option<String>,
    ) -> domains::Result<Comment> {
        let moderator = self.authorize(comment_id, moderator_id).await?;

        let comment = mutate_comment(self.comments.as_ref(), comment_id, self.policy.write_attempts, |c| {
            c.moderate(moderator.id, status, reason.clone());
            Ok(())
        })
        .await?;

        info!(status = %status, moderator = %moderator.username, "comment moderated");
        Ok(comment)
    }

    async fn authorize(&self, comment_id: CommentId, moderator_id: UserId) -> domains::Result<User> {
        if self.comments.find(comment_id).await?.is_none() {
            return Err(DomainError::not_found("Comment", comment_id));
        }

        let moderator = self
            .users
            .find_user(moderator_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", moderator_id))?;

        if !moderator.can_moderate() {
            warn!(%moderator_id, "moderation attempted without moderator role");
            return Err(DomainError::Forbidden(format!(
                "user {} is not authorized to moderate comments",
                moderator.username
            )));
        }
        Ok(moderator)
    }

    async fn post_of(&self, comment: &Comment) -> Option<PostSummary> {
        let timeout = self.policy.side_effect_timeout;
        let post = best_effort("post lookup", timeout, self.posts.find_post(comment.post_id))
            .await
            .flatten();
        if post.is_none() {
            warn!(post_id = %comment.post_id, "post unavailable, author notification skipped");
        }
        post
    }

    async fn alert_moderators(&self, comment: &Comment, reason: &str) {
        let timeout = self.policy.side_effect_timeout;
        let limit = self.policy.moderator_fanout_limit;

        let post_title = self
            .post_of(comment)
            .await
            .map(|p| p.title)
            .unwrap_or_else(|| format!("post {}", comment.post_id));
        let author_name = best_effort("author lookup", timeout, self.users.find_user(comment.author_id))
            .await
            .flatten()
            .map(|u| u.username)
            .unwrap_or_else(|| comment.author_id.to_string());

        let Some(moderators) =
            best_effort("moderator lookup", timeout, self.users.users_with_role(Role::Moderator, limit)).await
        else {
            return;
        };

        let recipients: Vec<UserId> = moderators.iter().take(limit).map(|m| m.id).collect();
        let notice: Notice = notices::comment_reported(&post_title, &author_name, reason, comment.report_count);
        let report = self.dispatcher.notify_many(&recipients, &notice).await;

        if !report.failures.is_empty() {
            warn!(
                delivered = report.delivered,
                failed = report.failures.len(),
                "some moderators were not alerted"
            );
        }
    }
}
