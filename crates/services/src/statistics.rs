//! # StatisticsAggregator
//!
//! Front for the single global statistics row. Increments and decrements are
//! individually atomic in the store but unordered across flows, so the
//! incremental path can drift; [`StatisticsAggregator::recount`] is the
//! authority of last resort.

use std::sync::Arc;
use std::time::Duration;

use domains::{
    CommentRepository, Counter, GlobalStatistics, PostDirectory, ReactionKind, ReactionRepository,
    StatisticsRepository, UserDirectory,
};
use tracing::{info, instrument};

use crate::policy::EngagementPolicy;
use crate::support::best_effort;

pub struct StatisticsAggregator {
    statistics: Arc<dyn StatisticsRepository>,
    timeout: Duration,
}

impl StatisticsAggregator {
    pub fn new(statistics: Arc<dyn StatisticsRepository>, policy: &EngagementPolicy) -> Self {
        Self {
            statistics,
            timeout: policy.side_effect_timeout,
        }
    }

    /// Best-effort; a failed write is logged for the next recount to fix.
    pub async fn increment(&self, counter: Counter) {
        self.adjust(counter, 1).await;
    }

    /// Best-effort and floored at zero.
    pub async fn decrement(&self, counter: Counter) {
        self.adjust(counter, -1).await;
    }

    async fn adjust(&self, counter: Counter, delta: i64) -> Option<GlobalStatistics> {
        let what = format!("{counter} adjustment by {delta}");
        best_effort(&what, self.timeout, self.statistics.adjust(counter, delta)).await
    }

    /// Current counters; all zero if the row was never written.
    pub async fn snapshot(&self) -> domains::Result<GlobalStatistics> {
        Ok(self.statistics.load().await?.unwrap_or_default())
    }

    /// Overwrites all five counters with authoritative totals.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self, totals: GlobalStatistics) -> domains::Result<GlobalStatistics> {
        let before = self.snapshot().await?;
        self.statistics.store(totals).await?;

        if before != totals {
            info!(?before, after = ?totals, "statistics reconciled with drift");
        } else {
            info!("statistics reconciled, no drift");
        }
        Ok(totals)
    }

    /// Counts every source and reconciles against the result.
    pub async fn recount(&self, sources: &Recount) -> domains::Result<GlobalStatistics> {
        let totals = sources.tally().await?;
        self.reconcile_all(totals).await
    }
}

/// The authoritative sources a recount reads from.
#[derive(Clone)]
pub struct Recount {
    pub users: Arc<dyn UserDirectory>,
    pub posts: Arc<dyn PostDirectory>,
    pub comments: Arc<dyn CommentRepository>,
    pub reactions: Arc<dyn ReactionRepository>,
}

impl Recount {
    pub async fn tally(&self) -> anyhow::Result<GlobalStatistics> {
        let (total_users, total_posts, total_comments, total_likes, total_dislikes) = tokio::try_join!(
            self.users.count_users(),
            self.posts.count_posts(),
            self.comments.count(),
            self.reactions.count(ReactionKind::Like),
            self.reactions.count(ReactionKind::Dislike),
        )?;

        Ok(GlobalStatistics {
            total_users,
            total_posts,
            total_comments,
            total_likes,
            total_dislikes,
        })
    }
}
