//! # colis-store
//!
//! SQLite persistence layer for the Colis delivery administration backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model: parcels, delivery agents, user accounts, destination addresses and
//! shipment notes.  Multi-row mutations (assignment, agent creation/deletion,
//! status transitions) run inside a single SQLite transaction.

pub mod addresses;
pub mod agents;
pub mod database;
pub mod migrations;
pub mod models;
pub mod notes;
pub mod parcels;
pub mod stats;
pub mod users;

mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
