//! Comment entity and its moderation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{CommentId, PostId, UserId};

/// Editorial review state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Spam,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "PENDING",
            ModerationStatus::Approved => "APPROVED",
            ModerationStatus::Rejected => "REJECTED",
            ModerationStatus::Spam => "SPAM",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ModerationStatus::Pending),
            "APPROVED" => Ok(ModerationStatus::Approved),
            "REJECTED" => Ok(ModerationStatus::Rejected),
            "SPAM" => Ok(ModerationStatus::Spam),
            other => Err(format!("unknown moderation status: {other}")),
        }
    }
}

/// Who moderated a comment and when. Both halves always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStamp {
    pub moderator_id: UserId,
    pub moderated_at: DateTime<Utc>,
}

/// A threaded comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub author_id: UserId,
    pub post_id: PostId,
    /// Parent comment for threaded replies
    pub parent_id: Option<CommentId>,
    pub status: ModerationStatus,
    pub moderation_reason: Option<String>,
    pub moderation: Option<ModerationStamp>,
    /// Never decreases over the comment's lifetime
    pub report_count: u32,
    pub like_count: u32,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
}

impl Comment {
    /// A freshly submitted comment, awaiting review.
    pub fn new(
        post_id: PostId,
        author_id: UserId,
        content: impl Into<String>,
        parent_id: Option<CommentId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CommentId::new(),
            content: content.into(),
            author_id,
            post_id,
            parent_id,
            status: ModerationStatus::Pending,
            moderation_reason: None,
            moderation: None,
            report_count: 0,
            like_count: 0,
            is_edited: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Applies a moderator decision. Any current status may be overridden.
    pub fn moderate(&mut self, moderator_id: UserId, status: ModerationStatus, reason: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.moderation_reason = reason;
        self.moderation = Some(ModerationStamp {
            moderator_id,
            moderated_at: now,
        });
        self.updated_at = now;
    }

    /// Counts one more report and returns `true` when this report sent an
    /// approved comment back to the review queue.
    pub fn record_report(&mut self, escalation_threshold: u32) -> bool {
        self.report_count = self.report_count.saturating_add(1);
        self.updated_at = Utc::now();

        if self.report_count >= escalation_threshold && self.status == ModerationStatus::Approved {
            self.status = ModerationStatus::Pending;
            return true;
        }
        false
    }

    pub fn edit(&mut self, content: impl Into<String>) {
        let now = Utc::now();
        self.content = content.into();
        self.is_edited = true;
        self.edited_at = Some(now);
        self.updated_at = now;
    }

    /// Floors at zero.
    pub fn adjust_likes(&mut self, delta: i32) {
        self.like_count = if delta >= 0 {
            self.like_count.saturating_add(delta.unsigned_abs())
        } else {
            self.like_count.saturating_sub(delta.unsigned_abs())
        };
        self.updated_at = Utc::now();
    }

    pub fn moderator_id(&self) -> Option<UserId> {
        self.moderation.map(|stamp| stamp.moderator_id)
    }
}
