//! # DomainError
//!
//! Centralized error handling for the engagement core.
//! Callers only ever see the kinds listed in [`ErrorKind`]; side-effect
//! failures (notifications, statistics) are logged and never reach them.
//!
//! Besides the four caller-facing kinds (`NotFound`, `Forbidden`,
//! `InvalidArgument`, `Conflict`) there is a fifth, `Storage`: the store
//! failed while applying the operation's primary mutation or read.
//! `Conflict` only comes out of version-checked writes (edits and moderator
//! decisions); reports and likes are counted by the store in one step and
//! never conflict.

use thiserror::Error;

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Comment, User, Post, Notification)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// The caller lacks author/admin/moderator rights for the mutation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or oversized input (e.g., blank reject reason)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Concurrent writers kept winning the race for the same record
    #[error("conflict: {0}")]
    Conflict(String),

    /// The Persistent Store failed while applying the primary mutation
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Coarse classification carried alongside the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidArgument,
    Conflict,
    Storage,
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound(entity, id.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound(..) => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// A specialized Result type for core logic.
pub type Result<T> = std::result::Result<T, DomainError>;
