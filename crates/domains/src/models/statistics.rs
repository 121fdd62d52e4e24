//! Site-wide aggregate counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five global counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Users,
    Posts,
    Comments,
    Likes,
    Dislikes,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::Users,
        Counter::Posts,
        Counter::Comments,
        Counter::Likes,
        Counter::Dislikes,
    ];

    /// Column name used by relational stores.
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Users => "total_users",
            Counter::Posts => "total_posts",
            Counter::Comments => "total_comments",
            Counter::Likes => "total_likes",
            Counter::Dislikes => "total_dislikes",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The single logical statistics row. All-zero when it has never been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    pub total_users: u64,
    pub total_posts: u64,
    pub total_comments: u64,
    pub total_likes: u64,
    pub total_dislikes: u64,
}

impl GlobalStatistics {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Users => self.total_users,
            Counter::Posts => self.total_posts,
            Counter::Comments => self.total_comments,
            Counter::Likes => self.total_likes,
            Counter::Dislikes => self.total_dislikes,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Users => &mut self.total_users,
            Counter::Posts => &mut self.total_posts,
            Counter::Comments => &mut self.total_comments,
            Counter::Likes => &mut self.total_likes,
            Counter::Dislikes => &mut self.total_dislikes,
        }
    }

    /// Adds `delta` to one counter, flooring the result at zero.
    pub fn apply(&mut self, counter: Counter, delta: i64) {
        let slot = self.slot(counter);
        *slot = if delta >= 0 {
            slot.saturating_add(delta.unsigned_abs())
        } else {
            slot.saturating_sub(delta.unsigned_abs())
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut stats = GlobalStatistics::default();
        stats.apply(Counter::Likes, -1);
        assert_eq!(stats.total_likes, 0);
        stats.apply(Counter::Likes, 2);
        stats.apply(Counter::Likes, -5);
        assert_eq!(stats.total_likes, 0);
    }

    #[test]
    fn test_apply_touches_only_one_counter() {
        let mut stats = GlobalStatistics::default();
        stats.apply(Counter::Comments, 3);
        for counter in Counter::ALL {
            let expected = if counter == Counter::Comments { 3 } else { 0 };
            assert_eq!(stats.get(counter), expected, "{counter}");
        }
    }
}
