//! Shipment note ([`ShipmentNote`]) persistence.
//!
//! A note is issued at most once per parcel.  `INSERT OR IGNORE` against the
//! UNIQUE parcel_id column makes issuance idempotent: the first request fixes
//! the generation timestamp and every later request reads it back.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ShipmentNote;
use crate::parcels::parse_ts;

impl Database {
    /// Fetch the note for a parcel, if one was ever generated.
    pub fn get_note_for_parcel(&self, parcel_id: i64) -> Result<Option<ShipmentNote>> {
        match self.conn().query_row(
            "SELECT id, parcel_id, generated_at FROM shipment_notes WHERE parcel_id = ?1",
            params![parcel_id],
            row_to_note,
        ) {
            Ok(note) => Ok(Some(note)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the parcel's note, creating it on first request.
    ///
    /// Fails with [`StoreError::NotFound`] if the parcel does not exist.
    pub fn get_or_create_note(&self, parcel_id: i64) -> Result<ShipmentNote> {
        let parcel_exists: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM parcels WHERE id = ?1",
            params![parcel_id],
            |row| row.get(0),
        )?;
        if parcel_exists == 0 {
            return Err(StoreError::NotFound);
        }

        self.conn().execute(
            "INSERT OR IGNORE INTO shipment_notes (parcel_id, generated_at)
             VALUES (?1, ?2)",
            params![parcel_id, Utc::now().to_rfc3339()],
        )?;

        self.get_note_for_parcel(parcel_id)?
            .ok_or(StoreError::NotFound)
    }
}

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShipmentNote> {
    let generated_str: String = row.get(2)?;
    Ok(ShipmentNote {
        id: row.get(0)?,
        parcel_id: row.get(1)?,
        generated_at: parse_ts(&generated_str, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_parcel, test_db};

    #[test]
    fn note_is_issued_once_and_cached() {
        let db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-note")).unwrap();

        assert!(db.get_note_for_parcel(parcel.id).unwrap().is_none());

        let first = db.get_or_create_note(parcel.id).unwrap();
        let second = db.get_or_create_note(parcel.id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn note_for_missing_parcel_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.get_or_create_note(999),
            Err(StoreError::NotFound)
        ));
    }
}
