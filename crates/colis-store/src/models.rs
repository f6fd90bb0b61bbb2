//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a JSON body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Account role.  Stored as TEXT in SQLite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Livreur,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Livreur => "LIVREUR",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLIENT" => Some(Role::Client),
            "LIVREUR" => Some(Role::Livreur),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Any account: client, delivery agent or administrator.
///
/// `password_hash` holds an argon2 PHC string; the store never sees a
/// plaintext password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub nom: String,
    pub prenom: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Agent (livreur)
// ---------------------------------------------------------------------------

/// A delivery agent, linked one-to-one to a [`User`] account.
///
/// `available` is recomputed after every status transition: an agent is
/// available iff no non-terminal parcel is assigned to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: i64,
    pub user_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub available: bool,
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Destination address, owned exclusively by the parcel that references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: i64,
    pub rue: String,
    pub ville: String,
    pub code_postal: String,
    pub pays: String,
}

/// Address fields as supplied by a caller, before the row exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressInput {
    pub rue: String,
    pub ville: String,
    pub code_postal: String,
    pub pays: String,
}

// ---------------------------------------------------------------------------
// Parcel (colis)
// ---------------------------------------------------------------------------

/// Parcel lifecycle status.  Stored as TEXT in SQLite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    Pending,
    InTransit,
    Delivered,
    Returned,
    Cancelled,
}

impl ParcelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Pending => "PENDING",
            ParcelStatus::InTransit => "IN_TRANSIT",
            ParcelStatus::Delivered => "DELIVERED",
            ParcelStatus::Returned => "RETURNED",
            ParcelStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ParcelStatus::Pending),
            "IN_TRANSIT" => Some(ParcelStatus::InTransit),
            "DELIVERED" => Some(ParcelStatus::Delivered),
            "RETURNED" => Some(ParcelStatus::Returned),
            "CANCELLED" => Some(ParcelStatus::Cancelled),
            _ => None,
        }
    }

    /// Delivered, Returned and Cancelled accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParcelStatus::Delivered | ParcelStatus::Returned | ParcelStatus::Cancelled
        )
    }

    /// Open parcels keep their agent busy.
    pub fn is_open(&self) -> bool {
        matches!(self, ParcelStatus::Pending | ParcelStatus::InTransit)
    }
}

/// A single shipment, tracked from creation to a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parcel {
    pub id: i64,
    /// Externally shared unique identifier, generated once at creation.
    pub tracking_number: String,
    pub description: String,
    /// Weight in kilograms, always >= 0.
    pub weight: f64,
    pub status: ParcelStatus,
    pub sent_at: DateTime<Utc>,
    /// Set exactly once, when the parcel reaches Delivered.
    pub delivered_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub address_id: Option<i64>,
    pub agent_id: Option<i64>,
    pub owner_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Shipment note (bordereau)
// ---------------------------------------------------------------------------

/// A shipment note, one-to-one with a parcel.  Generated on demand and
/// cached: repeated requests reuse the first generation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShipmentNote {
    pub id: i64,
    pub parcel_id: i64,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ParcelStatus::Pending,
            ParcelStatus::InTransit,
            ParcelStatus::Delivered,
            ParcelStatus::Returned,
            ParcelStatus::Cancelled,
        ] {
            assert_eq!(ParcelStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ParcelStatus::parse("EN_ATTENTE"), None);
    }

    #[test]
    fn terminal_and_open_are_disjoint() {
        for status in [
            ParcelStatus::Pending,
            ParcelStatus::InTransit,
            ParcelStatus::Delivered,
            ParcelStatus::Returned,
            ParcelStatus::Cancelled,
        ] {
            assert!(status.is_terminal() != status.is_open());
        }
    }
}
