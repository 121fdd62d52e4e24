//! # Domain Models
//!
//! These structs represent the entities the engagement core reasons about.
//! Users and posts belong to external collaborators; only the fields the
//! core needs to authorize and to compose messages are modelled here.

mod comment;
mod notification;
mod reaction;
mod statistics;

pub use comment::{Comment, ModerationStamp, ModerationStatus};
pub use notification::{Notice, Notification, NotificationKind};
pub use reaction::{Reaction, ReactionChange, ReactionKind, ReactionStats};
pub use statistics::{Counter, GlobalStatistics};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ids::{PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "MODERATOR" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user record as resolved by the Identity Provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn new(username: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admins and moderators may approve, reject and flag spam.
    pub fn can_moderate(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Moderator)
    }
}

/// What the core needs to know about a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub author_id: UserId,
}
