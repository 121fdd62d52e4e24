use async_trait::async_trait;
use dashmap::DashMap;
use domains::{Notification, NotificationId, NotificationRepository, UserId};

#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    notifications: DashMap<NotificationId, Notification>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: Notification) -> anyhow::Result<()> {
        self.notifications.insert(notification.id, notification);
        Ok(())
    }

    async fn find(&self, id: NotificationId) -> anyhow::Result<Option<Notification>> {
        Ok(self.notifications.get(&id).map(|n| n.value().clone()))
    }

    async fn list_for_recipient(&self, recipient_id: UserId) -> anyhow::Result<Vec<Notification>> {
        let mut inbox: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .map(|n| n.value().clone())
            .collect();
        // v7 ids break ties between notifications created in the same instant
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(inbox)
    }

    async fn mark_read(&self, id: NotificationId) -> anyhow::Result<()> {
        let mut notification = self
            .notifications
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("notification {id} does not exist"))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        let mut flipped = 0;
        for mut n in self.notifications.iter_mut() {
            if n.recipient_id == recipient_id && !n.read {
                n.read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn count_unread(&self, recipient_id: UserId) -> anyhow::Result<u64> {
        Ok(self
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as u64)
    }
}
