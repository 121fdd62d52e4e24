//! Process-local adapters backed by `DashMap`. Used by the integration
//! tests and by hosts that do not need durability.

mod comments;
mod directory;
mod notifications;
mod reactions;
mod statistics;

pub use comments::InMemoryCommentRepository;
pub use directory::InMemoryDirectory;
pub use notifications::InMemoryNotificationRepository;
pub use reactions::InMemoryReactionRepository;
pub use statistics::InMemoryStatisticsRepository;

use std::sync::Arc;

/// One instance of every in-memory adapter, shared by reference.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub comments: Arc<InMemoryCommentRepository>,
    pub reactions: Arc<InMemoryReactionRepository>,
    pub notifications: Arc<InMemoryNotificationRepository>,
    pub statistics: Arc<InMemoryStatisticsRepository>,
    pub directory: Arc<InMemoryDirectory>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}
