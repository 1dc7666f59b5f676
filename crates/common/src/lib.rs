//! Shared building blocks for the notification pending store: configuration,
//! connection pooling, the error taxonomy and the record/filter types.

pub mod config;
pub mod db;
pub mod error;
pub mod types;
