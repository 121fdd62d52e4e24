//! # NotificationDispatcher
//!
//! Creates notification rows on behalf of the other services and serves the
//! recipient's inbox. Delivery is best-effort: a failed or slow insert is
//! logged and reported, never turned into an error of the triggering action.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use domains::{DomainError, Notice, Notification, NotificationId, NotificationRepository, UserId};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::policy::EngagementPolicy;

/// Outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub recipient_id: UserId,
    pub error: String,
}

pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationRepository>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifications: Arc<dyn NotificationRepository>, policy: &EngagementPolicy) -> Self {
        Self {
            notifications,
            timeout: policy.side_effect_timeout,
        }
    }

    async fn deliver(&self, recipient_id: UserId, notice: &Notice) -> anyhow::Result<Notification> {
        let notification = Notification::addressed(recipient_id, notice);
        tokio::time::timeout(self.timeout, self.notifications.insert(notification.clone()))
            .await
            .context("notification store did not answer in time")??;
        Ok(notification)
    }

    /// Fire-and-forget from the caller's point of view.
    pub async fn notify(&self, recipient_id: UserId, notice: &Notice) -> Option<Notification> {
        match self.deliver(recipient_id, notice).await {
            Ok(notification) => {
                debug!(%recipient_id, kind = notice.kind.as_str(), "notification delivered");
                Some(notification)
            }
            Err(err) => {
                warn!(%recipient_id, kind = notice.kind.as_str(), error = %err, "notification dropped");
                None
            }
        }
    }

    /// Same notice to each recipient. Inserts run concurrently under one
    /// deadline; whatever has not landed by then is abandoned and reported
    /// as failed. Nothing is retried.
    pub async fn notify_many(&self, recipients: &[UserId], notice: &Notice) -> DispatchReport {
        let deadline = Instant::now() + self.timeout;
        let mut outstanding: Vec<UserId> = recipients.to_vec();
        let mut inserts = JoinSet::new();
        for &recipient_id in recipients {
            let notifications = Arc::clone(&self.notifications);
            let notification = Notification::addressed(recipient_id, notice);
            inserts.spawn(async move { (recipient_id, notifications.insert(notification).await) });
        }

        let mut report = DispatchReport::default();
        while let Ok(Some(joined)) = tokio::time::timeout_at(deadline, inserts.join_next()).await {
            let Ok((recipient_id, result)) = joined else {
                // panicked insert; its recipient stays outstanding
                continue;
            };
            if let Some(pos) = outstanding.iter().position(|id| *id == recipient_id) {
                outstanding.swap_remove(pos);
            }
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(%recipient_id, kind = notice.kind.as_str(), error = %err, "notification dropped");
                    report.failures.push(DispatchFailure {
                        recipient_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        inserts.abort_all();

        if !outstanding.is_empty() {
            warn!(
                kind = notice.kind.as_str(),
                abandoned = outstanding.len(),
                timeout_ms = self.timeout.as_millis() as u64,
                "notification fan-out hit its deadline"
            );
        }
        report.failures.extend(outstanding.into_iter().map(|recipient_id| DispatchFailure {
            recipient_id,
            error: "notification store did not answer in time".into(),
        }));
        report
    }

    pub async fn inbox(&self, user_id: UserId) -> domains::Result<Vec<Notification>> {
        Ok(self.notifications.list_for_recipient(user_id).await?)
    }

    /// Only the recipient may flip the read flag.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, id: NotificationId, user_id: UserId) -> domains::Result<Notification> {
        let mut notification = self
            .notifications
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification", id))?;

        if notification.recipient_id != user_id {
            return Err(DomainError::Forbidden(
                "notifications can only be read by their recipient".into(),
            ));
        }

        if !notification.read {
            self.notifications.mark_read(id).await?;
            notification.read = true;
        }
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> domains::Result<u64> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> domains::Result<u64> {
        Ok(self.notifications.count_unread(user_id).await?)
    }
}
