//! # services
//!
//! Business logic of the engagement core. Each service receives the ports
//! it needs as trait objects; [`EngagementCore`] wires all of them from a
//! single [`Ports`] bundle.

pub mod comments;
pub mod engagement;
pub mod moderation;
pub mod notices;
pub mod notifications;
pub mod policy;
pub mod statistics;

mod support;

use std::sync::Arc;

use domains::{
    CommentRepository, NotificationRepository, PostDirectory, ReactionRepository, StatisticsRepository,
    UserDirectory,
};

pub use comments::CommentService;
pub use engagement::EngagementLedger;
pub use moderation::ModerationEngine;
pub use notifications::{DispatchFailure, DispatchReport, NotificationDispatcher};
pub use policy::EngagementPolicy;
pub use statistics::{Recount, StatisticsAggregator};

/// Every collaborator the core talks to.
#[derive(Clone)]
pub struct Ports {
    pub comments: Arc<dyn CommentRepository>,
    pub reactions: Arc<dyn ReactionRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub statistics: Arc<dyn StatisticsRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub posts: Arc<dyn PostDirectory>,
}

/// The assembled core: one entry point per caller-initiated action.
pub struct EngagementCore {
    pub comments: CommentService,
    pub moderation: ModerationEngine,
    pub ledger: EngagementLedger,
    pub statistics: Arc<StatisticsAggregator>,
    pub notifications: Arc<NotificationDispatcher>,
    recount: Recount,
}

impl EngagementCore {
    pub fn new(ports: Ports, policy: EngagementPolicy) -> Self {
        let statistics = Arc::new(StatisticsAggregator::new(ports.statistics.clone(), &policy));
        let notifications = Arc::new(NotificationDispatcher::new(ports.notifications.clone(), &policy));

        let comments = CommentService::new(
            ports.comments.clone(),
            ports.users.clone(),
            ports.posts.clone(),
            statistics.clone(),
            notifications.clone(),
            policy.clone(),
        );
        let moderation = ModerationEngine::new(
            ports.comments.clone(),
            ports.users.clone(),
            ports.posts.clone(),
            notifications.clone(),
            policy,
        );
        let ledger = EngagementLedger::new(
            ports.reactions.clone(),
            ports.users.clone(),
            ports.posts.clone(),
            statistics.clone(),
        );
        let recount = Recount {
            users: ports.users,
            posts: ports.posts,
            comments: ports.comments,
            reactions: ports.reactions,
        };

        Self {
            comments,
            moderation,
            ledger,
            statistics,
            notifications,
            recount,
        }
    }

    /// Recomputes the global counters from the source tables.
    pub async fn reconcile_statistics(&self) -> domains::Result<domains::GlobalStatistics> {
        self.statistics.recount(&self.recount).await
    }
}
