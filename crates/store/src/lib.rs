//! Notification pending store.
//!
//! Queues CI-produced notifications keyed by
//! `(team_name, branch, build_type, created_at)` until an aggregator reads and
//! deletes them. Persistence goes through the [`client::DatabaseClient`] seam:
//! [`postgres::PgClient`] in production, [`memory::MemoryClient`] in tests.

pub mod client;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod store;

pub use store::{PendingStore, StoreOptions};
