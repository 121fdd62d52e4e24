//! # CommentService
//!
//! Authoring flows around a comment: submit, edit, delete and like. New
//! comments enter the moderation machine as PENDING; their visibility is a
//! presentation concern and not gated here.

use std::sync::Arc;

use domains::{
    Comment, CommentId, CommentRepository, Counter, DomainError, PostDirectory, PostId, Role, User,
    UserDirectory, UserId,
};
use tracing::{info, instrument};

use crate::notices;
use crate::notifications::NotificationDispatcher;
use crate::policy::EngagementPolicy;
use crate::statistics::StatisticsAggregator;
use crate::support::mutate_comment;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostDirectory>,
    statistics: Arc<StatisticsAggregator>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: EngagementPolicy,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostDirectory>,
        statistics: Arc<StatisticsAggregator>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: EngagementPolicy,
    ) -> Self {
        Self {
            comments,
            users,
            posts,
            statistics,
            dispatcher,
            policy,
        }
    }

    fn validate_content(&self, content: &str) -> domains::Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::InvalidArgument("comment content is required".into()));
        }
        let max = self.policy.max_comment_length;
        if content.chars().count() > max {
            return Err(DomainError::InvalidArgument(format!(
                "comment must not exceed {max} characters"
            )));
        }
        Ok(content.to_string())
    }

    async fn user(&self, id: UserId) -> domains::Result<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    pub async fn find(&self, id: CommentId) -> domains::Result<Comment> {
        self.comments
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id))
    }

    /// Only the author or an administrator may edit or delete.
    fn ensure_owner_or_admin(comment: &Comment, actor: &User, action: &str) -> domains::Result<()> {
        if comment.author_id == actor.id || actor.has_role(Role::Admin) {
            return Ok(());
        }
        Err(DomainError::Forbidden(format!(
            "user {} is not allowed to {action} this comment",
            actor.username
        )))
    }

    /// Submits a comment, optionally as a reply. The post author and the
    /// parent comment's author hear about it unless they wrote it.
    #[instrument(skip(self, content))]
    pub async fn create(
        &self,
        post_id: PostId,
        author_id: UserId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> domains::Result<Comment> {
        let content = self.validate_content(content)?;
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))?;
        let author = self.user(author_id).await?;
        let parent = match parent_id {
            Some(id) => Some(self.find(id).await?),
            None => None,
        };

        let comment = Comment::new(post_id, author_id, content, parent_id);
        self.comments.insert(comment.clone()).await?;
        info!(comment_id = %comment.id, "comment submitted for review");

        self.statistics.increment(Counter::Comments).await;

        if post.author_id != author_id {
            self.dispatcher
                .notify(post.author_id, &notices::new_comment(&author.username, &post, &comment))
                .await;
        }
        if let Some(parent) = parent.filter(|p| p.author_id != author_id) {
            self.dispatcher
                .notify(parent.author_id, &notices::comment_reply(&author.username, &comment))
                .await;
        }
        Ok(comment)
    }

    #[instrument(skip(self, content))]
    pub async fn edit(&self, comment_id: CommentId, editor_id: UserId, content: &str) -> domains::Result<Comment> {
        let content = self.validate_content(content)?;
        let editor = self.user(editor_id).await?;

        mutate_comment(self.comments.as_ref(), comment_id, self.policy.write_attempts, |c| {
            Self::ensure_owner_or_admin(c, &editor, "edit")?;
            c.edit(content.clone());
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, comment_id: CommentId, actor_id: UserId) -> domains::Result<()> {
        let actor = self.user(actor_id).await?;
        let comment = self.find(comment_id).await?;
        Self::ensure_owner_or_admin(&comment, &actor, "delete")?;

        if self.comments.delete(comment_id).await? {
            info!("comment deleted");
            self.statistics.decrement(Counter::Comments).await;
        }
        Ok(())
    }

    /// Bumps the comment's like count and tells its author, unless they
    /// liked their own comment.
    #[instrument(skip(self))]
    pub async fn like(&self, comment_id: CommentId, user_id: UserId) -> domains::Result<Comment> {
        let liker = self.user(user_id).await?;
        let comment = self.adjust_likes(comment_id, 1).await?;

        if comment.author_id != user_id {
            self.dispatcher
                .notify(comment.author_id, &notices::comment_liked(&liker.username, &comment))
                .await;
        }
        Ok(comment)
    }

    /// Like count never drops below zero.
    #[instrument(skip(self))]
    pub async fn unlike(&self, comment_id: CommentId, user_id: UserId) -> domains::Result<Comment> {
        self.user(user_id).await?;
        self.adjust_likes(comment_id, -1).await
    }

    async fn adjust_likes(&self, comment_id: CommentId, delta: i32) -> domains::Result<Comment> {
        self.comments
            .adjust_likes(comment_id, delta)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", comment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{
        GlobalStatistics, MockCommentRepository, MockNotificationRepository, MockPostDirectory,
        MockStatisticsRepository, MockUserDirectory, NotificationKind, PostSummary,
    };
    use mockall::predicate::eq;

    struct Parties {
        post_author: User,
        commenter: User,
        admin: User,
        post: PostSummary,
    }

    fn parties() -> Parties {
        let post_author = User::new("writer", vec![Role::User]);
        let post = PostSummary {
            id: PostId::new(),
            title: "Borrowing".into(),
            author_id: post_author.id,
        };
        Parties {
            post_author,
            commenter: User::new("reader", vec![Role::User]),
            admin: User::new("root", vec![Role::Admin]),
            post,
        }
    }

    fn service(
        p: &Parties,
        comments: MockCommentRepository,
        statistics: MockStatisticsRepository,
        notifications: MockNotificationRepository,
    ) -> CommentService {
        let people = vec![p.post_author.clone(), p.commenter.clone(), p.admin.clone()];
        let mut users = MockUserDirectory::new();
        users
            .expect_find_user()
            .returning(move |id| Ok(people.iter().find(|u| u.id == id).cloned()));
        let post = p.post.clone();
        let mut posts = MockPostDirectory::new();
        posts
            .expect_find_post()
            .returning(move |id| Ok((id == post.id).then(|| post.clone())));

        let policy = EngagementPolicy::default();
        CommentService::new(
            Arc::new(comments),
            Arc::new(users),
            Arc::new(posts),
            Arc::new(StatisticsAggregator::new(Arc::new(statistics), &policy)),
            Arc::new(NotificationDispatcher::new(Arc::new(notifications), &policy)),
            policy,
        )
    }

    #[tokio::test]
    async fn test_create_counts_and_notifies_post_author() {
        let p = parties();
        let post_author = p.post_author.id;

        let mut comments = MockCommentRepository::new();
        comments.expect_insert().times(1).returning(|_| Ok(()));
        let mut statistics = MockStatisticsRepository::new();
        statistics
            .expect_adjust()
            .with(eq(Counter::Comments), eq(1i64))
            .times(1)
            .returning(|_, _| Ok(GlobalStatistics::default()));
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_insert()
            .withf(move |n| n.recipient_id == post_author && n.kind == NotificationKind::Comment)
            .times(1)
            .returning(|_| Ok(()));

        let comment = service(&p, comments, statistics, notifications)
            .create(p.post.id, p.commenter.id, "  nice post  ", None)
            .await
            .unwrap();
        assert_eq!(comment.content, "nice post");
        assert_eq!(comment.status, domains::ModerationStatus::Pending);
    }

    #[tokio::test]
    async fn test_reply_notifies_parent_author() {
        let p = parties();
        let parent = Comment::new(p.post.id, p.commenter.id, "first", None);
        let parent_id = parent.id;
        let commenter = p.commenter.id;

        let mut comments = MockCommentRepository::new();
        comments
            .expect_find()
            .with(eq(parent_id))
            .returning(move |_| Ok(Some(parent.clone())));
        comments.expect_insert().returning(|_| Ok(()));
        let mut statistics = MockStatisticsRepository::new();
        statistics
            .expect_adjust()
            .returning(|_, _| Ok(GlobalStatistics::default()));
        let mut notifications = MockNotificationRepository::new();
        // the post author replies to the commenter: only the reply notice goes out
        notifications
            .expect_insert()
            .withf(move |n| n.recipient_id == commenter && n.kind == NotificationKind::CommentReply)
            .times(1)
            .returning(|_| Ok(()));

        let reply = service(&p, comments, statistics, notifications)
            .create(p.post.id, p.post_author.id, "thanks!", Some(parent_id))
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(parent_id));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_content() {
        let p = parties();
        let mut comments = MockCommentRepository::new();
        comments.expect_insert().never();

        let err = service(
            &p,
            comments,
            MockStatisticsRepository::new(),
            MockNotificationRepository::new(),
        )
        .create(p.post.id, p.commenter.id, "   ", None)
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_only_author_or_admin_may_delete() {
        let p = parties();
        let comment = Comment::new(p.post.id, p.commenter.id, "mine", None);
        let id = comment.id;

        let mut comments = MockCommentRepository::new();
        comments
            .expect_find()
            .returning(move |_| Ok(Some(comment.clone())));
        comments.expect_delete().with(eq(id)).times(1).returning(|_| Ok(true));
        let mut statistics = MockStatisticsRepository::new();
        statistics
            .expect_adjust()
            .with(eq(Counter::Comments), eq(-1i64))
            .times(1)
            .returning(|_, _| Ok(GlobalStatistics::default()));

        let svc = service(&p, comments, statistics, MockNotificationRepository::new());

        let err = svc.delete(id, p.post_author.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        svc.delete(id, p.admin.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_like_is_one_store_step_and_never_conflicts() {
        let p = parties();
        let mut comment = Comment::new(p.post.id, p.post_author.id, "likeable", None);
        comment.like_count = 2;
        let id = comment.id;
        let post_author = p.post_author.id;

        let mut comments = MockCommentRepository::new();
        comments.expect_find().never();
        comments.expect_update().never();
        comments
            .expect_adjust_likes()
            .with(eq(id), eq(1))
            .times(1)
            .returning(move |_, delta| {
                let mut liked = comment.clone();
                liked.adjust_likes(delta);
                liked.version += 1;
                Ok(Some(liked))
            });
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_insert()
            .withf(move |n| n.recipient_id == post_author && n.kind == NotificationKind::Like)
            .times(1)
            .returning(|_| Ok(()));

        let liked = service(&p, comments, MockStatisticsRepository::new(), notifications)
            .like(id, p.commenter.id)
            .await
            .unwrap();
        assert_eq!(liked.like_count, 3);
    }

    #[tokio::test]
    async fn test_unlike_missing_comment_is_not_found() {
        let p = parties();
        let mut comments = MockCommentRepository::new();
        comments.expect_adjust_likes().returning(|_, _| Ok(None));

        let err = service(
            &p,
            comments,
            MockStatisticsRepository::new(),
            MockNotificationRepository::new(),
        )
        .unlike(CommentId::new(), p.commenter.id)
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("Comment", _)));
    }
}
