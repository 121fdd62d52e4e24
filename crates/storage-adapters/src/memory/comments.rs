use async_trait::async_trait;
use dashmap::DashMap;
use domains::{Comment, CommentId, CommentRepository, CommentWrite, ModerationStatus, RecordedReport};

/// Comments keyed by id. A version check and its write happen under the
/// same shard lock, so concurrent updates of one comment serialize.
#[derive(Debug, Default)]
pub struct InMemoryCommentRepository {
    comments: DashMap<CommentId, Comment>,
}

impl InMemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn insert(&self, comment: Comment) -> anyhow::Result<()> {
        if self.comments.contains_key(&comment.id) {
            anyhow::bail!("comment {} already exists", comment.id);
        }
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn find(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.value().clone()))
    }

    async fn update(&self, mut comment: Comment) -> anyhow::Result<CommentWrite> {
        let Some(mut stored) = self.comments.get_mut(&comment.id) else {
            return Ok(CommentWrite::VersionConflict);
        };
        if stored.version != comment.version {
            return Ok(CommentWrite::VersionConflict);
        }

        comment.version += 1;
        *stored = comment.clone();
        Ok(CommentWrite::Committed(comment))
    }

    async fn record_report(&self, id: CommentId, escalation_threshold: u32) -> anyhow::Result<Option<RecordedReport>> {
        Ok(self.comments.get_mut(&id).map(|mut stored| {
            let escalated = stored.record_report(escalation_threshold);
            stored.version += 1;
            RecordedReport {
                comment: stored.clone(),
                escalated,
            }
        }))
    }

    async fn adjust_likes(&self, id: CommentId, delta: i32) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get_mut(&id).map(|mut stored| {
            stored.adjust_likes(delta);
            stored.version += 1;
            stored.clone()
        }))
    }

    async fn delete(&self, id: CommentId) -> anyhow::Result<bool> {
        Ok(self.comments.remove(&id).is_some())
    }

    async fn list_by_status(&self, status: ModerationStatus, limit: usize) -> anyhow::Result<Vec<Comment>> {
        let mut matching: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.value().clone())
            .collect();
        matching.sort_by_key(|c| c.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn list_reported(&self, limit: usize) -> anyhow::Result<Vec<Comment>> {
        let mut reported: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.report_count > 0)
            .map(|c| c.value().clone())
            .collect();
        reported.sort_by(|a, b| {
            b.report_count
                .cmp(&a.report_count)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        reported.truncate(limit);
        Ok(reported)
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(self.comments.len() as u64)
    }
}
