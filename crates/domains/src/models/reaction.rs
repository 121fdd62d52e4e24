//! Reactions: one standing like/dislike per (user, post).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::statistics::Counter;
use crate::ids::{PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "LIKE",
            ReactionKind::Dislike => "DISLIKE",
        }
    }

    /// The global counter that tallies this kind.
    pub fn counter(&self) -> Counter {
        match self {
            ReactionKind::Like => Counter::Likes,
            ReactionKind::Dislike => Counter::Dislikes,
        }
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(ReactionKind::Like),
            "DISLIKE" => Ok(ReactionKind::Dislike),
            other => Err(format!("unknown reaction kind: {other}")),
        }
    }
}

/// A user's vote on a post. The (user_id, post_id) pair is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: UserId,
    pub post_id: PostId,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reaction {
    pub fn new(user_id: UserId, post_id: PostId, kind: ReactionKind) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            post_id,
            kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionChange {
    /// No row existed for the pair
    Created(Reaction),
    /// Same kind as before; only `updated_at` was refreshed
    Unchanged(Reaction),
    /// Kind overwritten in place
    Retyped {
        previous: ReactionKind,
        reaction: Reaction,
    },
}

impl ReactionChange {
    pub fn into_reaction(self) -> Reaction {
        match self {
            ReactionChange::Created(r) | ReactionChange::Unchanged(r) => r,
            ReactionChange::Retyped { reaction, .. } => reaction,
        }
    }
}

/// Per-post tally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactionStats {
    pub post_id: PostId,
    pub likes: u64,
    pub dislikes: u64,
    /// `likes / (likes + dislikes)`, or exactly `0.0` when nobody reacted
    pub like_ratio: f64,
}

impl ReactionStats {
    pub fn from_counts(post_id: PostId, likes: u64, dislikes: u64) -> Self {
        let total = likes + dislikes;
        let like_ratio = if total > 0 {
            likes as f64 / total as f64
        } else {
            0.0
        };
        Self {
            post_id,
            likes,
            dislikes,
            like_ratio,
        }
    }
}
