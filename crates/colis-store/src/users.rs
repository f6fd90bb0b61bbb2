//! CRUD operations for [`User`] accounts.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Role, User};
use crate::parcels::parse_ts;

const USER_COLUMNS: &str =
    "id, nom, prenom, email, password_hash, role, created_at, last_login_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user and return it with its assigned row id.
    ///
    /// `password_hash` must already be an argon2 PHC string.
    pub fn insert_user(
        &self,
        nom: &str,
        prenom: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let created_at = Utc::now();
        self.conn().execute(
            "INSERT INTO users (nom, prenom, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                nom,
                prenom,
                email,
                password_hash,
                role.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(User {
            id: self.conn().last_insert_rowid(),
            nom: nom.to_string(),
            prenom: prenom.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
            last_login_at: None,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by row id.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                |row| row_to_user(row, 0),
            )
            .map_err(no_rows)
    }

    /// Fetch a single user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                |row| row_to_user(row, 0),
            )
            .map_err(no_rows)
    }

    /// List every user, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map([], |row| row_to_user(row, 0))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// List users holding a given role, newest first.
    pub fn list_users_with_role(&self, role: Role) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![role.as_str()], |row| row_to_user(row, 0))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite name, surname and email.  The role and password hash have
    /// dedicated setters so edit forms cannot change them by accident.
    pub fn update_user_profile(
        &self,
        user_id: i64,
        nom: &str,
        prenom: &str,
        email: &str,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET nom = ?1, prenom = ?2, email = ?3 WHERE id = ?4",
            params![nom, prenom, email, user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Replace a user's password hash.
    pub fn set_user_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record a successful login.
    pub fn touch_last_login(&self, user_id: i64, when: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![when.to_rfc3339(), user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn no_rows(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::from(other),
    }
}

/// Map a `rusqlite::Row` to a [`User`], reading columns starting at `offset`.
/// The offset lets joined queries (agents + users) reuse the mapper.
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<User> {
    let role_str: String = row.get(offset + 5)?;
    let created_str: String = row.get(offset + 6)?;
    let last_login_str: Option<String> = row.get(offset + 7)?;

    let role = Role::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 5,
            rusqlite::types::Type::Text,
            format!("unknown role: {role_str}").into(),
        )
    })?;

    let created_at = parse_ts(&created_str, offset + 6)?;
    let last_login_at = last_login_str
        .as_deref()
        .map(|s| parse_ts(s, offset + 7))
        .transpose()?;

    Ok(User {
        id: row.get(offset)?,
        nom: row.get(offset + 1)?,
        prenom: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        password_hash: row.get(offset + 4)?,
        role,
        created_at,
        last_login_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    #[test]
    fn insert_and_fetch_by_email() {
        let db = test_db();
        let user = db
            .insert_user("Durand", "Claire", "claire@colis.test", "$argon2id$x", Role::Client)
            .unwrap();

        let found = db.get_user_by_email("claire@colis.test").unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Client);
        assert!(found.last_login_at.is_none());
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let db = test_db();
        db.insert_user("A", "A", "same@colis.test", "$h", Role::Client)
            .unwrap();
        let err = db
            .insert_user("B", "B", "same@colis.test", "$h", Role::Client)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn touch_last_login_round_trips() {
        let db = test_db();
        let user = db
            .insert_user("Durand", "Claire", "login@colis.test", "$h", Role::Admin)
            .unwrap();

        let when = Utc::now();
        db.touch_last_login(user.id, when).unwrap();

        let found = db.get_user(user.id).unwrap();
        assert_eq!(
            found.last_login_at.map(|d| d.timestamp()),
            Some(when.timestamp())
        );
    }

    #[test]
    fn list_users_with_role_filters() {
        let db = test_db();
        db.insert_user("A", "A", "c1@colis.test", "$h", Role::Client)
            .unwrap();
        db.insert_user("B", "B", "l1@colis.test", "$h", Role::Livreur)
            .unwrap();

        let clients = db.list_users_with_role(Role::Client).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].email, "c1@colis.test");
    }
}
