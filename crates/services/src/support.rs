//! Helpers shared by the services: the optimistic comment write loop and
//! the deadline wrapper for best-effort side effects.

use std::future::Future;
use std::time::Duration;

use domains::{Comment, CommentId, CommentRepository, CommentWrite, DomainError};
use tracing::{debug, warn};

/// Load, transform and write back a comment, retrying while another writer
/// keeps bumping its version. `apply` may run more than once.
pub(crate) async fn mutate_comment<F>(
    comments: &dyn CommentRepository,
    id: CommentId,
    attempts: u32,
    mut apply: F,
) -> domains::Result<Comment>
where
    F: FnMut(&mut Comment) -> domains::Result<()> + Send,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let mut comment = comments
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id))?;

        apply(&mut comment)?;

        match comments.update(comment).await? {
            CommentWrite::Committed(saved) => return Ok(saved),
            CommentWrite::VersionConflict => {
                debug!(comment_id = %id, attempt, "stale comment version, retrying");
            }
        }
    }

    Err(DomainError::Conflict(format!(
        "comment {id} was modified concurrently {attempts} times in a row"
    )))
}

/// Runs a side effect under a deadline. Failures are logged and dropped.
pub(crate) async fn best_effort<T, F>(what: &str, deadline: Duration, fut: F) -> Option<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!(error = %err, "{what} failed");
            None
        }
        Err(_) => {
            warn!(timeout_ms = deadline.as_millis() as u64, "{what} timed out");
            None
        }
    }
}

/// Trims and bounds a free-text reason.
pub(crate) fn required_reason(reason: &str, max_chars: usize) -> domains::Result<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::InvalidArgument("a reason is required".into()));
    }
    if reason.chars().count() > max_chars {
        return Err(DomainError::InvalidArgument(format!(
            "reason must not exceed {max_chars} characters"
        )));
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockCommentRepository, PostId, UserId};

    #[test]
    fn test_required_reason() {
        assert!(required_reason("   ", 10).is_err());
        assert_eq!(required_reason("  spam ", 10).unwrap(), "spam");
        assert!(required_reason(&"x".repeat(11), 10).is_err());
        // characters, not bytes
        assert!(required_reason(&"é".repeat(10), 10).is_ok());
    }

    #[tokio::test]
    async fn test_mutate_retries_on_version_conflict() {
        let stored = Comment::new(PostId::new(), UserId::new(), "hi", None);
        let id = stored.id;

        let mut repo = MockCommentRepository::new();
        let found = stored.clone();
        repo.expect_find().times(2).returning(move |_| Ok(Some(found.clone())));
        let mut writes = 0;
        repo.expect_update().times(2).returning(move |mut c| {
            writes += 1;
            if writes == 1 {
                return Ok(CommentWrite::VersionConflict);
            }
            c.version += 1;
            Ok(CommentWrite::Committed(c))
        });

        let mut calls = 0;
        let saved = mutate_comment(&repo, id, 5, |c| {
            calls += 1;
            c.adjust_likes(1);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(saved.like_count, 1);
        assert_eq!(saved.version, 1);
    }

    #[tokio::test]
    async fn test_mutate_gives_up_with_conflict() {
        let stored = Comment::new(PostId::new(), UserId::new(), "hi", None);
        let id = stored.id;

        let mut repo = MockCommentRepository::new();
        repo.expect_find().returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update().times(3).returning(|_| Ok(CommentWrite::VersionConflict));

        let err = mutate_comment(&repo, id, 3, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mutate_missing_comment_is_not_found() {
        let mut repo = MockCommentRepository::new();
        repo.expect_find().returning(|_| Ok(None));
        repo.expect_update().never();

        let err = mutate_comment(&repo, CommentId::new(), 3, |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound("Comment", _)));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors_and_timeouts() {
        let ok = best_effort("ok", Duration::from_secs(1), async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok, Some(7));

        let failed: Option<()> =
            best_effort("boom", Duration::from_secs(1), async { Err(anyhow::anyhow!("boom")) }).await;
        assert!(failed.is_none());

        let slow: Option<()> = best_effort("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await;
        assert!(slow.is_none());
    }
}
