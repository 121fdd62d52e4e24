//! engagement/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for the comment
//! moderation and engagement core.

pub mod error;
pub mod ids;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use ids::*;
pub use models::*;
pub use ports::*;
