//! Tunables shared by the services.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reports needed before an approved comment goes back to review.
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;
/// Moderators notified per report. One page, no pagination loop.
pub const DEFAULT_MODERATOR_FANOUT: usize = 100;
pub const DEFAULT_MAX_REASON_LENGTH: usize = 500;
pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 1000;
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 5;
pub const DEFAULT_SIDE_EFFECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementPolicy {
    pub report_escalation_threshold: u32,
    pub moderator_fanout_limit: usize,
    /// Upper bound, in characters, for reject and report reasons
    pub max_reason_length: usize,
    pub max_comment_length: usize,
    /// Optimistic write attempts before giving up with `Conflict`
    pub write_attempts: u32,
    /// Deadline for best-effort statistics and notification writes
    pub side_effect_timeout: Duration,
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self {
            report_escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            moderator_fanout_limit: DEFAULT_MODERATOR_FANOUT,
            max_reason_length: DEFAULT_MAX_REASON_LENGTH,
            max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            side_effect_timeout: DEFAULT_SIDE_EFFECT_TIMEOUT,
        }
    }
}
