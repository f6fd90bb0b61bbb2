//! CRUD operations for [`Address`] records.
//!
//! Each parcel owns its own address row; identical addresses on different
//! parcels are deliberately not deduplicated.

use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Address, AddressInput};

impl Database {
    /// Insert a new address and return it with its assigned row id.
    pub fn insert_address(&self, input: &AddressInput) -> Result<Address> {
        self.conn().execute(
            "INSERT INTO addresses (rue, ville, code_postal, pays)
             VALUES (?1, ?2, ?3, ?4)",
            params![input.rue, input.ville, input.code_postal, input.pays],
        )?;

        Ok(Address {
            id: self.conn().last_insert_rowid(),
            rue: input.rue.clone(),
            ville: input.ville.clone(),
            code_postal: input.code_postal.clone(),
            pays: input.pays.clone(),
        })
    }

    /// Fetch a single address by row id.
    pub fn get_address(&self, id: i64) -> Result<Address> {
        self.conn()
            .query_row(
                "SELECT id, rue, ville, code_postal, pays FROM addresses WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Address {
                        id: row.get(0)?,
                        rue: row.get(1)?,
                        ville: row.get(2)?,
                        code_postal: row.get(3)?,
                        pays: row.get(4)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::from(other),
            })
    }

    /// Overwrite an existing address in place.
    pub fn update_address(&self, id: i64, input: &AddressInput) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE addresses SET rue = ?1, ville = ?2, code_postal = ?3, pays = ?4
             WHERE id = ?5",
            params![input.rue, input.ville, input.code_postal, input.pays, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    fn paris() -> AddressInput {
        AddressInput {
            rue: "12 rue de la Paix".to_string(),
            ville: "Paris".to_string(),
            code_postal: "75002".to_string(),
            pays: "France".to_string(),
        }
    }

    #[test]
    fn insert_update_round_trip() {
        let db = test_db();
        let address = db.insert_address(&paris()).unwrap();

        let mut updated = paris();
        updated.ville = "Lyon".to_string();
        db.update_address(address.id, &updated).unwrap();

        let found = db.get_address(address.id).unwrap();
        assert_eq!(found.ville, "Lyon");
        assert_eq!(found.rue, "12 rue de la Paix");
    }

    #[test]
    fn update_missing_address_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.update_address(42, &paris()),
            Err(StoreError::NotFound)
        ));
    }
}
