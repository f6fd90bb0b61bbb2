//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `agents`, `addresses`, `parcels`
//! and `shipment_notes`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (clients, delivery agents, admins)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    nom           TEXT NOT NULL,
    prenom        TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,                -- argon2 PHC string
    role          TEXT NOT NULL
                  CHECK (role IN ('CLIENT', 'LIVREUR', 'ADMIN')),
    created_at    TEXT NOT NULL,                -- ISO-8601 / RFC-3339
    last_login_at TEXT
);

-- ----------------------------------------------------------------
-- Delivery agents, one-to-one with a user account
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS agents (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL UNIQUE,
    latitude  REAL,
    longitude REAL,
    available INTEGER NOT NULL DEFAULT 1,       -- boolean 0/1, derived

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE RESTRICT
);

-- ----------------------------------------------------------------
-- Destination addresses, each owned by exactly one parcel
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS addresses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    rue         TEXT NOT NULL,
    ville       TEXT NOT NULL,
    code_postal TEXT NOT NULL,
    pays        TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Parcels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS parcels (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    tracking_number TEXT NOT NULL UNIQUE,       -- UUID v4, immutable
    description     TEXT NOT NULL DEFAULT '',
    weight          REAL NOT NULL,
    status          TEXT NOT NULL
                    CHECK (status IN ('PENDING', 'IN_TRANSIT', 'DELIVERED',
                                      'RETURNED', 'CANCELLED')),
    sent_at         TEXT NOT NULL,
    delivered_at    TEXT,
    deleted         INTEGER NOT NULL DEFAULT 0, -- soft-delete flag
    address_id      INTEGER,
    agent_id        INTEGER,
    owner_id        INTEGER,

    FOREIGN KEY (address_id) REFERENCES addresses(id) ON DELETE SET NULL,
    FOREIGN KEY (agent_id)   REFERENCES agents(id)    ON DELETE SET NULL,
    FOREIGN KEY (owner_id)   REFERENCES users(id)     ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_parcels_agent_status
    ON parcels(agent_id, status);
CREATE INDEX IF NOT EXISTS idx_parcels_sent_at
    ON parcels(sent_at DESC);

-- ----------------------------------------------------------------
-- Shipment notes (bordereaux), one-to-one with a parcel
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS shipment_notes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    parcel_id    INTEGER NOT NULL UNIQUE,
    generated_at TEXT NOT NULL,

    FOREIGN KEY (parcel_id) REFERENCES parcels(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
