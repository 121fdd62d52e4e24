//! # PostgreSQL adapter
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Comment writes are guarded by the `version` column; reaction upserts and
//! counter adjustments are single-row atomic statements.

use async_trait::async_trait;
use chrono::Utc;
use domains::{
    Comment, CommentId, CommentRepository, CommentWrite, Counter, GlobalStatistics, ModerationStamp,
    ModerationStatus, Notification, NotificationId, NotificationRepository, PostDirectory, PostId, PostSummary,
    Reaction, ReactionChange, ReactionKind, ReactionRepository, RecordedReport, Role, StatisticsRepository, User,
    UserDirectory, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

const COMMENT_COLUMNS: &str = "id, content, author_id, post_id, parent_id, status, moderation_reason, \
     moderated_by, moderated_at, report_count, like_count, is_edited, edited_at, created_at, updated_at, version";

const STATISTICS_COLUMNS: &str = "total_users, total_posts, total_comments, total_likes, total_dislikes";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "postgres pool ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn qualified_comment_columns(alias: &str) -> String {
    COMMENT_COLUMNS
        .split(", ")
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn comment_from_row(row: &PgRow) -> anyhow::Result<Comment> {
    let status: String = row.try_get("status")?;
    let moderated_by: Option<uuid::Uuid> = row.try_get("moderated_by")?;
    let moderated_at: Option<chrono::DateTime<Utc>> = row.try_get("moderated_at")?;
    let moderation = match (moderated_by, moderated_at) {
        (Some(id), Some(at)) => Some(ModerationStamp {
            moderator_id: id.into(),
            moderated_at: at,
        }),
        _ => None,
    };

    Ok(Comment {
        id: row.try_get::<uuid::Uuid, _>("id")?.into(),
        content: row.try_get("content")?,
        author_id: row.try_get::<uuid::Uuid, _>("author_id")?.into(),
        post_id: row.try_get::<uuid::Uuid, _>("post_id")?.into(),
        parent_id: row.try_get::<Option<uuid::Uuid>, _>("parent_id")?.map(Into::into),
        status: status.parse::<ModerationStatus>().map_err(anyhow::Error::msg)?,
        moderation_reason: row.try_get("moderation_reason")?,
        moderation,
        report_count: u32::try_from(row.try_get::<i32, _>("report_count")?)?,
        like_count: u32::try_from(row.try_get::<i32, _>("like_count")?)?,
        is_edited: row.try_get("is_edited")?,
        edited_at: row.try_get("edited_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: u64::try_from(row.try_get::<i64, _>("version")?)?,
    })
}

fn reaction_from_row(row: &PgRow) -> anyhow::Result<Reaction> {
    let kind: String = row.try_get("kind")?;
    Ok(Reaction {
        user_id: row.try_get::<uuid::Uuid, _>("user_id")?.into(),
        post_id: row.try_get::<uuid::Uuid, _>("post_id")?.into(),
        kind: kind.parse::<ReactionKind>().map_err(anyhow::Error::msg)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> anyhow::Result<Notification> {
    let kind: String = row.try_get("kind")?;
    Ok(Notification {
        id: row.try_get::<uuid::Uuid, _>("id")?.into(),
        recipient_id: row.try_get::<uuid::Uuid, _>("recipient_id")?.into(),
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        kind: kind.parse().map_err(anyhow::Error::msg)?,
        link: row.try_get("link")?,
        read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let roles = row
        .try_get::<Vec<String>, _>("roles")?
        .iter()
        .map(|r| r.parse::<Role>().map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(User {
        id: row.try_get::<uuid::Uuid, _>("id")?.into(),
        username: row.try_get("username")?,
        roles,
    })
}

fn statistics_from_row(row: &PgRow) -> anyhow::Result<GlobalStatistics> {
    let column = |name: &str| -> anyhow::Result<u64> { Ok(u64::try_from(row.try_get::<i64, _>(name)?)?) };
    Ok(GlobalStatistics {
        total_users: column("total_users")?,
        total_posts: column("total_posts")?,
        total_comments: column("total_comments")?,
        total_likes: column("total_likes")?,
        total_dislikes: column("total_dislikes")?,
    })
}

fn as_i64(value: u64) -> anyhow::Result<i64> {
    Ok(i64::try_from(value)?)
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert(&self, comment: Comment) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO comments ({COMMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(comment.id.0)
        .bind(&comment.content)
        .bind(comment.author_id.0)
        .bind(comment.post_id.0)
        .bind(comment.parent_id.map(|p| p.0))
        .bind(comment.status.as_str())
        .bind(&comment.moderation_reason)
        .bind(comment.moderation.map(|m| m.moderator_id.0))
        .bind(comment.moderation.map(|m| m.moderated_at))
        .bind(i32::try_from(comment.report_count)?)
        .bind(i32::try_from(comment.like_count)?)
        .bind(comment.is_edited)
        .bind(comment.edited_at)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .bind(as_i64(comment.version)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(comment_from_row)
            .transpose()
    }

    async fn update(&self, comment: Comment) -> anyhow::Result<CommentWrite> {
        let row = sqlx::query(&format!(
            "UPDATE comments SET content = $3, status = $4, moderation_reason = $5, moderated_by = $6, \
             moderated_at = $7, report_count = $8, like_count = $9, is_edited = $10, edited_at = $11, \
             updated_at = $12, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.id.0)
        .bind(as_i64(comment.version)?)
        .bind(&comment.content)
        .bind(comment.status.as_str())
        .bind(&comment.moderation_reason)
        .bind(comment.moderation.map(|m| m.moderator_id.0))
        .bind(comment.moderation.map(|m| m.moderated_at))
        .bind(i32::try_from(comment.report_count)?)
        .bind(i32::try_from(comment.like_count)?)
        .bind(comment.is_edited)
        .bind(comment.edited_at)
        .bind(comment.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(CommentWrite::Committed(comment_from_row(&row)?)),
            None => Ok(CommentWrite::VersionConflict),
        }
    }

    async fn record_report(&self, id: CommentId, escalation_threshold: u32) -> anyhow::Result<Option<RecordedReport>> {
        // `prior` holds the row lock, so `escalated` compares against the replaced status.
        let columns = qualified_comment_columns("c");
        let row = sqlx::query(&format!(
            "WITH prior AS (SELECT id, status FROM comments WHERE id = $1 FOR UPDATE) \
             UPDATE comments AS c SET report_count = c.report_count + 1, \
             status = CASE WHEN c.report_count + 1 >= $2 AND c.status = $3 THEN $4 ELSE c.status END, \
             updated_at = $5, version = c.version + 1 \
             FROM prior WHERE c.id = prior.id \
             RETURNING {columns}, (prior.status = $3 AND c.status = $4) AS escalated"
        ))
        .bind(id.0)
        .bind(i32::try_from(escalation_threshold)?)
        .bind(ModerationStatus::Approved.as_str())
        .bind(ModerationStatus::Pending.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(RecordedReport {
                comment: comment_from_row(&row)?,
                escalated: row.try_get("escalated")?,
            })
        })
        .transpose()
    }

    async fn adjust_likes(&self, id: CommentId, delta: i32) -> anyhow::Result<Option<Comment>> {
        sqlx::query(&format!(
            "UPDATE comments SET like_count = GREATEST(like_count + $2, 0), updated_at = $3, \
             version = version + 1 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id.0)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(comment_from_row)
        .transpose()
    }

    async fn delete(&self, id: CommentId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_status(&self, status: ModerationStatus, limit: usize) -> anyhow::Result<Vec<Comment>> {
        sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE status = $1 ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(as_i64(limit as u64)?)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn list_reported(&self, limit: usize) -> anyhow::Result<Vec<Comment>> {
        sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE report_count > 0 \
             ORDER BY report_count DESC, created_at ASC LIMIT $1"
        ))
        .bind(as_i64(limit as u64)?)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn count(&self) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total)?)
    }
}

#[async_trait]
impl ReactionRepository for PgStore {
    /// Insert-or-lock inside one transaction. The primary key on
    /// `(user_id, post_id)` makes the first writer win; later writers take
    /// the row lock and see what they are replacing.
    async fn upsert(&self, user_id: UserId, post_id: PostId, kind: ReactionKind) -> anyhow::Result<ReactionChange> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO reactions (user_id, post_id, kind, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (user_id, post_id) DO NOTHING \
             RETURNING user_id, post_id, kind, created_at, updated_at",
        )
        .bind(user_id.0)
        .bind(post_id.0)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = inserted {
            let reaction = reaction_from_row(&row)?;
            tx.commit().await?;
            return Ok(ReactionChange::Created(reaction));
        }

        let existing = sqlx::query(
            "SELECT user_id, post_id, kind, created_at, updated_at FROM reactions \
             WHERE user_id = $1 AND post_id = $2 FOR UPDATE",
        )
        .bind(user_id.0)
        .bind(post_id.0)
        .fetch_one(&mut *tx)
        .await?;
        let previous = reaction_from_row(&existing)?.kind;

        let row = sqlx::query(
            "UPDATE reactions SET kind = $3, updated_at = $4 WHERE user_id = $1 AND post_id = $2 \
             RETURNING user_id, post_id, kind, created_at, updated_at",
        )
        .bind(user_id.0)
        .bind(post_id.0)
        .bind(kind.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let reaction = reaction_from_row(&row)?;
        tx.commit().await?;

        if previous == kind {
            Ok(ReactionChange::Unchanged(reaction))
        } else {
            Ok(ReactionChange::Retyped { previous, reaction })
        }
    }

    async fn remove(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>> {
        sqlx::query(
            "DELETE FROM reactions WHERE user_id = $1 AND post_id = $2 \
             RETURNING user_id, post_id, kind, created_at, updated_at",
        )
        .bind(user_id.0)
        .bind(post_id.0)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(reaction_from_row)
        .transpose()
    }

    async fn find(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>> {
        sqlx::query(
            "SELECT user_id, post_id, kind, created_at, updated_at FROM reactions \
             WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id.0)
        .bind(post_id.0)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(reaction_from_row)
        .transpose()
    }

    async fn count_for_post(&self, post_id: PostId, kind: ReactionKind) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE post_id = $1 AND kind = $2")
            .bind(post_id.0)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total)?)
    }

    async fn count(&self, kind: ReactionKind) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total)?)
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, n: Notification) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO notifications (id, recipient_id, title, message, kind, link, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(n.id.0)
        .bind(n.recipient_id.0)
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.kind.as_str())
        .bind(&n.link)
        .bind(n.read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: NotificationId) -> anyhow::Result<Option<Notification>> {
        sqlx::query("SELECT * FROM notifications WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(notification_from_row)
            .transpose()
    }

    async fn list_for_recipient(&self, recipient_id: UserId) -> anyhow::Result<Vec<Notification>> {
        sqlx::query("SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(recipient_id.0)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(notification_from_row)
            .collect()
    }

    async fn mark_read(&self, id: NotificationId) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        anyhow::ensure!(result.rows_affected() == 1, "notification {id} does not exist");
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND NOT is_read")
            .bind(recipient_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read")
                .bind(recipient_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(total)?)
    }
}

#[async_trait]
impl StatisticsRepository for PgStore {
    async fn load(&self) -> anyhow::Result<Option<GlobalStatistics>> {
        sqlx::query(&format!("SELECT {STATISTICS_COLUMNS} FROM global_statistics WHERE id = 1"))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(statistics_from_row)
            .transpose()
    }

    /// One statement: concurrent adjustments serialize on the row lock.
    async fn adjust(&self, counter: Counter, delta: i64) -> anyhow::Result<GlobalStatistics> {
        let column = counter.column();
        let row = sqlx::query(&format!(
            "INSERT INTO global_statistics (id, {column}) VALUES (1, GREATEST($1, 0)) \
             ON CONFLICT (id) DO UPDATE \
             SET {column} = GREATEST(global_statistics.{column} + $1, 0), updated_at = now() \
             RETURNING {STATISTICS_COLUMNS}"
        ))
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;
        statistics_from_row(&row)
    }

    async fn store(&self, stats: GlobalStatistics) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO global_statistics (id, {STATISTICS_COLUMNS}) VALUES (1, $1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET total_users = $1, total_posts = $2, total_comments = $3, \
             total_likes = $4, total_dislikes = $5, updated_at = now()"
        ))
        .bind(as_i64(stats.total_users)?)
        .bind(as_i64(stats.total_posts)?)
        .bind(as_i64(stats.total_comments)?)
        .bind(as_i64(stats.total_likes)?)
        .bind(as_i64(stats.total_dislikes)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: UserId) -> anyhow::Result<Option<User>> {
        sqlx::query("SELECT id, username, roles FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn users_with_role(&self, role: Role, limit: usize) -> anyhow::Result<Vec<User>> {
        sqlx::query("SELECT id, username, roles FROM users WHERE $1 = ANY(roles) ORDER BY id LIMIT $2")
            .bind(role.as_str())
            .bind(as_i64(limit as u64)?)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn count_users(&self) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total)?)
    }
}

#[async_trait]
impl PostDirectory for PgStore {
    async fn find_post(&self, id: PostId) -> anyhow::Result<Option<PostSummary>> {
        let row = sqlx::query("SELECT id, title, author_id FROM posts WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(PostSummary {
                id: row.try_get::<uuid::Uuid, _>("id")?.into(),
                title: row.try_get("title")?,
                author_id: row.try_get::<uuid::Uuid, _>("author_id")?.into(),
            })),
            None => Ok(None),
        }
    }

    async fn count_posts(&self) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a disposable database: DATABASE_URL=postgres://... cargo test -- --ignored
    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
        PgStore::connect(&url, 2).await.expect("Failed to connect")
    }

    #[tokio::test]
    #[ignore]
    async fn test_stale_comment_write_conflicts() {
        let store = store().await;
        let comment = Comment::new(PostId::new(), UserId::new(), "pg", None);
        CommentRepository::insert(&store, comment.clone()).await.unwrap();

        let first = store.update(comment.clone()).await.unwrap();
        assert!(matches!(first, CommentWrite::Committed(ref c) if c.version == 1));
        assert_eq!(store.update(comment).await.unwrap(), CommentWrite::VersionConflict);
    }

    #[tokio::test]
    #[ignore]
    async fn test_report_and_likes_skip_the_version_check() {
        let store = store().await;
        let mut comment = Comment::new(PostId::new(), UserId::new(), "pg", None);
        comment.moderate(UserId::new(), ModerationStatus::Approved, None);
        CommentRepository::insert(&store, comment.clone()).await.unwrap();

        let first = store.record_report(comment.id, 2).await.unwrap().unwrap();
        assert!(!first.escalated);
        let second = store.record_report(comment.id, 2).await.unwrap().unwrap();
        assert!(second.escalated);
        assert_eq!(second.comment.status, ModerationStatus::Pending);
        assert_eq!(second.comment.report_count, 2);

        let unliked = store.adjust_likes(comment.id, -1).await.unwrap().unwrap();
        assert_eq!(unliked.like_count, 0);
        assert_eq!(unliked.version, 3);
        assert!(store.record_report(CommentId::new(), 2).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_reaction_upsert_is_keyed_by_pair() {
        let store = store().await;
        let (user, post) = (UserId::new(), PostId::new());

        let created = store.upsert(user, post, ReactionKind::Like).await.unwrap();
        assert!(matches!(created, ReactionChange::Created(_)));
        let retyped = store.upsert(user, post, ReactionKind::Dislike).await.unwrap();
        assert!(matches!(retyped, ReactionChange::Retyped { previous: ReactionKind::Like, .. }));
        assert_eq!(store.count_for_post(post, ReactionKind::Like).await.unwrap(), 0);
        assert_eq!(store.count_for_post(post, ReactionKind::Dislike).await.unwrap(), 1);
    }
}
