//! eventindex-storage — repository backends for eventindex.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`postgres`] — PostgreSQL via `sqlx` (production)

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStorage;
pub use postgres::{PostgresOptions, PostgresStorage};
