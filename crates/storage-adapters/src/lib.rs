//! # storage-adapters
//!
//! Implementations of the `domains` ports. The in-memory adapters are always
//! built; the PostgreSQL adapter sits behind the `db-postgres` feature.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::InMemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
