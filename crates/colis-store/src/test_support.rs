//! Shared fixtures for store-level tests.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Parcel, ParcelStatus};

pub(crate) fn test_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

/// A pending, unassigned parcel with the given tracking number.
pub(crate) fn sample_parcel(tracking_number: &str) -> Parcel {
    Parcel {
        id: 0,
        tracking_number: tracking_number.to_string(),
        description: "Laptop".to_string(),
        weight: 2.5,
        status: ParcelStatus::Pending,
        sent_at: Utc::now(),
        delivered_at: None,
        deleted: false,
        address_id: None,
        agent_id: None,
        owner_id: None,
    }
}

/// Insert a client user directly and return the user row id.
pub(crate) fn sample_client(db: &Database, email: &str) -> i64 {
    db.conn()
        .execute(
            "INSERT INTO users (nom, prenom, email, password_hash, role, created_at)
             VALUES ('Martin', 'Claire', ?1, '$argon2id$stub', 'CLIENT', ?2)",
            params![email, Utc::now().to_rfc3339()],
        )
        .expect("insert user");
    db.conn().last_insert_rowid()
}

/// Insert a user + agent pair directly and return the agent row id.
pub(crate) fn sample_agent(db: &Database, email: &str) -> i64 {
    db.conn()
        .execute(
            "INSERT INTO users (nom, prenom, email, password_hash, role, created_at)
             VALUES ('Dupont', 'Jean', ?1, '$argon2id$stub', 'LIVREUR', ?2)",
            params![email, Utc::now().to_rfc3339()],
        )
        .expect("insert user");
    let user_id = db.conn().last_insert_rowid();

    db.conn()
        .execute(
            "INSERT INTO agents (user_id, available) VALUES (?1, 1)",
            params![user_id],
        )
        .expect("insert agent");
    db.conn().last_insert_rowid()
}
