use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{PostId, Reaction, ReactionChange, ReactionKind, ReactionRepository, UserId};

/// Reactions keyed by their natural (user, post) key. The entry API holds
/// the shard lock across check-and-write, so a pair can never get two rows.
#[derive(Debug, Default)]
pub struct InMemoryReactionRepository {
    reactions: DashMap<(UserId, PostId), Reaction>,
}

impl InMemoryReactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }
}

#[async_trait]
impl ReactionRepository for InMemoryReactionRepository {
    async fn upsert(&self, user_id: UserId, post_id: PostId, kind: ReactionKind) -> anyhow::Result<ReactionChange> {
        let change = match self.reactions.entry((user_id, post_id)) {
            Entry::Vacant(slot) => {
                let reaction = Reaction::new(user_id, post_id, kind);
                slot.insert(reaction.clone());
                ReactionChange::Created(reaction)
            }
            Entry::Occupied(mut slot) => {
                let reaction = slot.get_mut();
                let previous = reaction.kind;
                reaction.kind = kind;
                reaction.updated_at = Utc::now();
                if previous == kind {
                    ReactionChange::Unchanged(reaction.clone())
                } else {
                    ReactionChange::Retyped {
                        previous,
                        reaction: reaction.clone(),
                    }
                }
            }
        };
        Ok(change)
    }

    async fn remove(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>> {
        Ok(self.reactions.remove(&(user_id, post_id)).map(|(_, r)| r))
    }

    async fn find(&self, user_id: UserId, post_id: PostId) -> anyhow::Result<Option<Reaction>> {
        Ok(self.reactions.get(&(user_id, post_id)).map(|r| r.value().clone()))
    }

    async fn count_for_post(&self, post_id: PostId, kind: ReactionKind) -> anyhow::Result<u64> {
        Ok(self
            .reactions
            .iter()
            .filter(|r| r.post_id == post_id && r.kind == kind)
            .count() as u64)
    }

    async fn count(&self, kind: ReactionKind) -> anyhow::Result<u64> {
        Ok(self.reactions.iter().filter(|r| r.kind == kind).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_outcomes() {
        let repo = InMemoryReactionRepository::new();
        let (user, post) = (UserId::new(), PostId::new());

        let first = repo.upsert(user, post, ReactionKind::Like).await.unwrap();
        assert!(matches!(first, ReactionChange::Created(_)));

        let again = repo.upsert(user, post, ReactionKind::Like).await.unwrap();
        assert!(matches!(again, ReactionChange::Unchanged(_)));

        let switched = repo.upsert(user, post, ReactionKind::Dislike).await.unwrap();
        assert!(matches!(
            switched,
            ReactionChange::Retyped { previous: ReactionKind::Like, .. }
        ));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reactions_create_once() {
        let repo = Arc::new(InMemoryReactionRepository::new());
        let (user, post) = (UserId::new(), PostId::new());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.upsert(user, post, ReactionKind::Like).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if let ReactionChange::Created(_) = task.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_pair() {
        let repo = InMemoryReactionRepository::new();
        let removed = repo.remove(UserId::new(), PostId::new()).await;
        assert!(tokio_test::assert_ok!(removed).is_none());
    }
}
