//! Frontdesk persistence - SQLite storage for conversations, appointments
//! and the cross-role replay/transcript records.
//!
//! Repository traits live in `repositories`; every trait has a SQL
//! implementation and an in-memory implementation used by tests and the
//! local simulator.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
