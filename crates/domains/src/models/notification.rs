use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ids::{NotificationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Comment,
    CommentReply,
    Like,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Comment => "COMMENT",
            NotificationKind::CommentReply => "COMMENT_REPLY",
            NotificationKind::Like => "LIKE",
            NotificationKind::System => "SYSTEM",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMMENT" => Ok(NotificationKind::Comment),
            "COMMENT_REPLY" => Ok(NotificationKind::CommentReply),
            "LIKE" => Ok(NotificationKind::Like),
            "SYSTEM" => Ok(NotificationKind::System),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// The content of a notification, before it is addressed to anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Deep link into the UI (e.g. `/posts/{id}#comment-{id}`)
    pub link: String,
}

impl Notice {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            link: link.into(),
        }
    }
}

/// A delivered notification. Immutable apart from `read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn addressed(recipient_id: UserId, notice: &Notice) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id,
            title: notice.title.clone(),
            message: notice.message.clone(),
            kind: notice.kind,
            link: notice.link.clone(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
