//! CRUD operations for [`Agent`] records and their backing user accounts.
//!
//! An agent is always created and deleted together with its user row, inside
//! one transaction: an agent without credentials (or orphaned credentials
//! with no agent) is a correctness bug.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Agent, Role, User};
use crate::users::row_to_user;

const AGENT_COLUMNS: &str = "id, user_id, latitude, longitude, available";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a user account (role Livreur) and its agent row in one
    /// transaction.  Returns both with their assigned ids.
    ///
    /// `password_hash` must already be an argon2 PHC string; plaintext never
    /// reaches the store.
    pub fn insert_agent(
        &mut self,
        nom: &str,
        prenom: &str,
        email: &str,
        password_hash: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<(User, Agent)> {
        let created_at = Utc::now();
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO users (nom, prenom, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                nom,
                prenom,
                email,
                password_hash,
                Role::Livreur.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO agents (user_id, latitude, longitude, available)
             VALUES (?1, ?2, ?3, 1)",
            params![user_id, latitude, longitude],
        )?;
        let agent_id = tx.last_insert_rowid();

        tx.commit()?;

        tracing::info!(agent_id, user_id, "agent created");

        Ok((
            User {
                id: user_id,
                nom: nom.to_string(),
                prenom: prenom.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                role: Role::Livreur,
                created_at,
                last_login_at: None,
            },
            Agent {
                id: agent_id,
                user_id,
                latitude,
                longitude,
                available: true,
            },
        ))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single agent by row id.
    pub fn get_agent(&self, id: i64) -> Result<Agent> {
        self.conn()
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id],
                row_to_agent,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::from(other),
            })
    }

    /// Fetch the agent linked to a user account, if any.
    pub fn get_agent_for_user(&self, user_id: i64) -> Result<Option<Agent>> {
        match self.conn().query_row(
            &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE user_id = ?1"),
            params![user_id],
            row_to_agent,
        ) {
            Ok(agent) => Ok(Some(agent)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch an agent by the email of its user account.
    pub fn get_agent_by_email(&self, email: &str) -> Result<Agent> {
        self.conn()
            .query_row(
                "SELECT a.id, a.user_id, a.latitude, a.longitude, a.available
                 FROM agents a
                 JOIN users u ON u.id = a.user_id
                 WHERE u.email = ?1",
                params![email],
                row_to_agent,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::from(other),
            })
    }

    /// List every agent together with its user account, newest user first.
    pub fn list_agents(&self) -> Result<Vec<(Agent, User)>> {
        let mut stmt = self.conn().prepare(
            "SELECT a.id, a.user_id, a.latitude, a.longitude, a.available,
                    u.id, u.nom, u.prenom, u.email, u.password_hash, u.role,
                    u.created_at, u.last_login_at
             FROM agents a
             JOIN users u ON u.id = a.user_id
             ORDER BY u.created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let agent = row_to_agent(row)?;
            let user = row_to_user(row, 5)?;
            Ok((agent, user))
        })?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite an agent's coordinates.  Availability is derived and only
    /// written by the transition handlers.
    pub fn update_agent_position(
        &self,
        agent_id: i64,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE agents SET latitude = ?1, longitude = ?2 WHERE id = ?3",
            params![latitude, longitude, agent_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an agent and its user account in one transaction, agent row
    /// first (foreign-key ordering).  Returns `true` if the agent existed.
    pub fn delete_agent(&mut self, agent_id: i64) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let user_id: Option<i64> = match tx.query_row(
            "SELECT user_id FROM agents WHERE id = ?1",
            params![agent_id],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let Some(user_id) = user_id else {
            return Ok(false);
        };

        // Detach any parcels still pointing at this agent before the row goes.
        tx.execute(
            "UPDATE parcels SET agent_id = NULL WHERE agent_id = ?1",
            params![agent_id],
        )?;
        tx.execute("DELETE FROM agents WHERE id = ?1", params![agent_id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;

        tx.commit()?;

        tracing::info!(agent_id, user_id, "agent deleted");
        Ok(true)
    }
}

/// Map a `rusqlite::Row` to an [`Agent`].
fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        available: row.get(4)?,
    })
}
