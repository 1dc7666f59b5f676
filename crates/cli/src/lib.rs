//! Command-line glue for the notification pending store.

pub mod args;
pub mod commands;
