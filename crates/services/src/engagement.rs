//! # EngagementLedger
//!
//! Owns the one-reaction-per-(user, post) rule and the like/dislike tallies.
//! The store performs check-then-write atomically for a pair, so exactly one
//! of several racing first reactions reports `Created` and bumps a counter.

use std::sync::Arc;

use domains::{
    DomainError, PostDirectory, PostId, Reaction, ReactionChange, ReactionKind, ReactionRepository,
    ReactionStats, UserDirectory, UserId,
};
use tracing::{debug, info, instrument};

use crate::statistics::StatisticsAggregator;

pub struct EngagementLedger {
    reactions: Arc<dyn ReactionRepository>,
    users: Arc<dyn UserDirectory>,
    posts: Arc<dyn PostDirectory>,
    statistics: Arc<StatisticsAggregator>,
}

impl EngagementLedger {
    pub fn new(
        reactions: Arc<dyn ReactionRepository>,
        users: Arc<dyn UserDirectory>,
        posts: Arc<dyn PostDirectory>,
        statistics: Arc<StatisticsAggregator>,
    ) -> Self {
        Self {
            reactions,
            users,
            posts,
            statistics,
        }
    }

    async fn ensure_parties(&self, user_id: UserId, post_id: PostId) -> domains::Result<()> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(DomainError::not_found("User", user_id));
        }
        self.ensure_post(post_id).await
    }

    async fn ensure_post(&self, post_id: PostId) -> domains::Result<()> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(DomainError::not_found("Post", post_id));
        }
        Ok(())
    }

    /// Records `kind` as the user's reaction to the post.
    ///
    /// Only a brand-new reaction moves a global counter. Switching kinds
    /// overwrites the row and leaves both counters alone; the statistics
    /// recount corrects the resulting drift.
    #[instrument(skip(self))]
    pub async fn upsert_reaction(
        &self,
        user_id: UserId,
        post_id: PostId,
        kind: ReactionKind,
    ) -> domains::Result<Reaction> {
        self.ensure_parties(user_id, post_id).await?;

        let change = self.reactions.upsert(user_id, post_id, kind).await?;
        match &change {
            ReactionChange::Created(_) => {
                info!(kind = kind.as_str(), "reaction created");
                self.statistics.increment(kind.counter()).await;
            }
            ReactionChange::Unchanged(_) => {
                debug!(kind = kind.as_str(), "reaction unchanged");
            }
            ReactionChange::Retyped { previous, .. } => {
                info!(from = previous.as_str(), to = kind.as_str(), "reaction retyped, counters untouched");
            }
        }
        Ok(change.into_reaction())
    }

    /// Withdraws the user's reaction. Nothing to remove is not an error.
    #[instrument(skip(self))]
    pub async fn remove_reaction(&self, user_id: UserId, post_id: PostId) -> domains::Result<Option<Reaction>> {
        self.ensure_parties(user_id, post_id).await?;

        let removed = self.reactions.remove(user_id, post_id).await?;
        match &removed {
            Some(reaction) => {
                info!(kind = reaction.kind.as_str(), "reaction removed");
                self.statistics.decrement(reaction.kind.counter()).await;
            }
            None => debug!("no reaction to remove"),
        }
        Ok(removed)
    }

    pub async fn stats_for(&self, post_id: PostId) -> domains::Result<ReactionStats> {
        self.ensure_post(post_id).await?;

        let likes = self.reactions.count_for_post(post_id, ReactionKind::Like).await?;
        let dislikes = self.reactions.count_for_post(post_id, ReactionKind::Dislike).await?;
        Ok(ReactionStats::from_counts(post_id, likes, dislikes))
    }

    /// The user's standing reaction, if any.
    pub async fn reaction_of(&self, user_id: UserId, post_id: PostId) -> domains::Result<Option<Reaction>> {
        self.ensure_parties(user_id, post_id).await?;
        Ok(self.reactions.find(user_id, post_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EngagementPolicy;
    use domains::{
        Counter, GlobalStatistics, MockPostDirectory, MockReactionRepository, MockStatisticsRepository,
        MockUserDirectory, PostSummary, Role, User,
    };
    use mockall::predicate::eq;

    fn directories(user_id: UserId, post_id: PostId) -> (MockUserDirectory, MockPostDirectory) {
        let mut users = MockUserDirectory::new();
        users.expect_find_user().returning(move |id| {
            Ok((id == user_id).then(|| User {
                id,
                username: "alice".into(),
                roles: vec![Role::User],
            }))
        });
        let mut posts = MockPostDirectory::new();
        posts.expect_find_post().returning(move |id| {
            Ok((id == post_id).then(|| PostSummary {
                id,
                title: "Hello".into(),
                author_id: UserId::new(),
            }))
        });
        (users, posts)
    }

    fn ledger(
        reactions: MockReactionRepository,
        statistics: MockStatisticsRepository,
        user_id: UserId,
        post_id: PostId,
    ) -> EngagementLedger {
        let (users, posts) = directories(user_id, post_id);
        let aggregator = StatisticsAggregator::new(Arc::new(statistics), &EngagementPolicy::default());
        EngagementLedger::new(Arc::new(reactions), Arc::new(users), Arc::new(posts), Arc::new(aggregator))
    }

    #[tokio::test]
    async fn test_first_reaction_increments_counter() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions
            .expect_upsert()
            .returning(|u, p, k| Ok(ReactionChange::Created(Reaction::new(u, p, k))));
        let mut statistics = MockStatisticsRepository::new();
        statistics
            .expect_adjust()
            .with(eq(Counter::Dislikes), eq(1i64))
            .times(1)
            .returning(|_, _| Ok(GlobalStatistics::default()));

        let reaction = ledger(reactions, statistics, user_id, post_id)
            .upsert_reaction(user_id, post_id, ReactionKind::Dislike)
            .await
            .unwrap();
        assert_eq!(reaction.kind, ReactionKind::Dislike);
    }

    #[tokio::test]
    async fn test_retype_leaves_counters_alone() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions.expect_upsert().returning(|u, p, k| {
            Ok(ReactionChange::Retyped {
                previous: ReactionKind::Like,
                reaction: Reaction::new(u, p, k),
            })
        });
        let mut statistics = MockStatisticsRepository::new();
        statistics.expect_adjust().never();

        let reaction = ledger(reactions, statistics, user_id, post_id)
            .upsert_reaction(user_id, post_id, ReactionKind::Dislike)
            .await
            .unwrap();
        assert_eq!(reaction.kind, ReactionKind::Dislike);
    }

    #[tokio::test]
    async fn test_remove_without_reaction_is_noop() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions.expect_remove().returning(|_, _| Ok(None));
        let mut statistics = MockStatisticsRepository::new();
        statistics.expect_adjust().never();

        let removed = ledger(reactions, statistics, user_id, post_id)
            .remove_reaction(user_id, post_id)
            .await
            .unwrap();
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn test_counter_failure_does_not_fail_reaction() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions
            .expect_upsert()
            .returning(|u, p, k| Ok(ReactionChange::Created(Reaction::new(u, p, k))));
        let mut statistics = MockStatisticsRepository::new();
        statistics
            .expect_adjust()
            .returning(|_, _| Err(anyhow::anyhow!("statistics row unavailable")));

        let result = ledger(reactions, statistics, user_id, post_id)
            .upsert_reaction(user_id, post_id, ReactionKind::Like)
            .await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions.expect_upsert().never();

        let err = ledger(reactions, MockStatisticsRepository::new(), user_id, post_id)
            .upsert_reaction(user_id, PostId::new(), ReactionKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("Post", _)));
    }

    #[tokio::test]
    async fn test_stats_with_no_reactions() {
        let (user_id, post_id) = (UserId::new(), PostId::new());

        let mut reactions = MockReactionRepository::new();
        reactions.expect_count_for_post().returning(|_, _| Ok(0));

        let stats = ledger(reactions, MockStatisticsRepository::new(), user_id, post_id)
            .stats_for(post_id)
            .await
            .unwrap();
        assert_eq!(stats.likes, 0);
        assert_eq!(stats.dislikes, 0);
        assert_eq!(stats.like_ratio, 0.0);
    }
}
