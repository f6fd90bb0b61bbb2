//! CRUD and lifecycle queries for [`Parcel`] records.
//!
//! The two multi-row mutations ([`Database::try_assign_parcel`] and
//! [`Database::transition_parcel`]) run inside a single SQLite transaction so
//! the parcel row and the agent's availability flag always commit together.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Parcel, ParcelStatus};

const PARCEL_COLUMNS: &str = "id, tracking_number, description, weight, status, \
     sent_at, delivered_at, deleted, address_id, agent_id, owner_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new parcel and return it with its assigned row id.
    pub fn insert_parcel(&self, parcel: &Parcel) -> Result<Parcel> {
        self.conn().execute(
            "INSERT INTO parcels (tracking_number, description, weight, status,
                                  sent_at, delivered_at, deleted, address_id,
                                  agent_id, owner_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                parcel.tracking_number,
                parcel.description,
                parcel.weight,
                parcel.status.as_str(),
                parcel.sent_at.to_rfc3339(),
                parcel.delivered_at.map(|d| d.to_rfc3339()),
                parcel.deleted,
                parcel.address_id,
                parcel.agent_id,
                parcel.owner_id,
            ],
        )?;

        let mut inserted = parcel.clone();
        inserted.id = self.conn().last_insert_rowid();
        Ok(inserted)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single parcel by row id.  Soft-deleted parcels are still
    /// reachable here; only listings exclude them.
    pub fn get_parcel(&self, id: i64) -> Result<Parcel> {
        self.conn()
            .query_row(
                &format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE id = ?1"),
                params![id],
                row_to_parcel,
            )
            .map_err(not_found)
    }

    /// Fetch a single parcel by its tracking number.
    pub fn get_parcel_by_tracking_number(&self, tracking_number: &str) -> Result<Parcel> {
        self.conn()
            .query_row(
                &format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE tracking_number = ?1"),
                params![tracking_number],
                row_to_parcel,
            )
            .map_err(not_found)
    }

    /// List all parcels that are not soft-deleted, newest first.
    pub fn list_active_parcels(&self) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE deleted = 0
                 ORDER BY sent_at DESC"
            ),
            params![],
        )
    }

    /// List parcels assigned to a specific agent.
    pub fn list_parcels_for_agent(&self, agent_id: i64) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE agent_id = ?1 AND deleted = 0
                 ORDER BY sent_at DESC"
            ),
            params![agent_id],
        )
    }

    /// List parcels assigned to an agent, filtered by status.
    pub fn list_parcels_for_agent_with_status(
        &self,
        agent_id: i64,
        status: ParcelStatus,
    ) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE agent_id = ?1 AND status = ?2 AND deleted = 0
                 ORDER BY sent_at DESC"
            ),
            params![agent_id, status.as_str()],
        )
    }

    /// List the parcels owned by a user, newest first.
    pub fn list_parcels_for_owner(&self, owner_id: i64) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE owner_id = ?1 AND deleted = 0
                 ORDER BY sent_at DESC"
            ),
            params![owner_id],
        )
    }

    /// List parcels still waiting for an agent: no agent attached, or never
    /// moved past Pending.
    pub fn list_unassigned_parcels(&self) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE (agent_id IS NULL OR status = 'PENDING') AND deleted = 0
                 ORDER BY sent_at DESC"
            ),
            params![],
        )
    }

    /// Count all non-deleted parcels assigned to an agent, matching what
    /// [`Database::list_parcels_for_agent`] returns.
    pub fn count_parcels_for_agent(&self, agent_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM parcels WHERE agent_id = ?1 AND deleted = 0",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count non-deleted parcels assigned to an agent with a given status.
    pub fn count_parcels_for_agent_with_status(
        &self,
        agent_id: i64,
        status: ParcelStatus,
    ) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM parcels
             WHERE agent_id = ?1 AND status = ?2 AND deleted = 0",
            params![agent_id, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The most recent `limit` parcels for an agent, by send date descending.
    pub fn recent_parcels_for_agent(&self, agent_id: i64, limit: u32) -> Result<Vec<Parcel>> {
        self.query_parcels(
            &format!(
                "SELECT {PARCEL_COLUMNS} FROM parcels
                 WHERE agent_id = ?1 AND deleted = 0
                 ORDER BY sent_at DESC
                 LIMIT ?2"
            ),
            params![agent_id, limit],
        )
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the mutable fields of a parcel.  The tracking number is
    /// immutable and never written after insert.
    pub fn update_parcel(&self, parcel: &Parcel) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE parcels
             SET description = ?1, weight = ?2, status = ?3, delivered_at = ?4,
                 deleted = ?5, address_id = ?6, agent_id = ?7, owner_id = ?8
             WHERE id = ?9",
            params![
                parcel.description,
                parcel.weight,
                parcel.status.as_str(),
                parcel.delivered_at.map(|d| d.to_rfc3339()),
                parcel.deleted,
                parcel.address_id,
                parcel.agent_id,
                parcel.owner_id,
                parcel.id,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Atomically attach an agent to a pending, unassigned parcel.
    ///
    /// The compare-and-swap `WHERE` clause guarantees that of two concurrent
    /// assignment attempts exactly one wins; the loser observes `Ok(false)`.
    /// The parcel moves to InTransit and the agent's availability is
    /// recomputed inside the same transaction.
    ///
    /// Fails with [`StoreError::NotFound`] if either row is absent.
    pub fn try_assign_parcel(&mut self, parcel_id: i64, agent_id: i64) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let agent_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM agents WHERE id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        if agent_exists == 0 {
            return Err(StoreError::NotFound);
        }

        let affected = tx.execute(
            "UPDATE parcels
             SET agent_id = ?1, status = 'IN_TRANSIT'
             WHERE id = ?2 AND agent_id IS NULL AND status = 'PENDING'
                   AND deleted = 0",
            params![agent_id, parcel_id],
        )?;

        if affected == 0 {
            let parcel_exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM parcels WHERE id = ?1",
                params![parcel_id],
                |row| row.get(0),
            )?;
            if parcel_exists == 0 {
                return Err(StoreError::NotFound);
            }
            // Parcel exists but was already assigned, deleted or past
            // Pending: the CAS lost.
            return Ok(false);
        }

        recompute_availability(&tx, agent_id)?;
        tx.commit()?;

        tracing::debug!(parcel_id, agent_id, "parcel assigned");
        Ok(true)
    }

    /// Write a new status for a parcel and recompute the assigned agent's
    /// availability, all in one transaction.
    ///
    /// When `delivered` is set, `delivered_at` is written only if it is still
    /// NULL, so the first delivery timestamp is never overwritten.
    pub fn transition_parcel(
        &mut self,
        parcel_id: i64,
        new_status: ParcelStatus,
        delivered: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let agent_id: Option<i64> = tx
            .query_row(
                "SELECT agent_id FROM parcels WHERE id = ?1",
                params![parcel_id],
                |row| row.get(0),
            )
            .map_err(not_found)?;

        tx.execute(
            "UPDATE parcels
             SET status = ?1,
                 delivered_at = COALESCE(delivered_at, ?2)
             WHERE id = ?3",
            params![
                new_status.as_str(),
                delivered.map(|d| d.to_rfc3339()),
                parcel_id
            ],
        )?;

        if let Some(agent_id) = agent_id {
            recompute_availability(&tx, agent_id)?;
        }
        tx.commit()?;

        tracing::debug!(parcel_id, status = new_status.as_str(), "parcel transitioned");
        Ok(())
    }

    /// Flag a parcel as deleted.  The row is retained and stays reachable by
    /// id; listings skip it.
    pub fn soft_delete_parcel(&self, id: i64) -> Result<()> {
        let affected = self
            .conn()
            .execute("UPDATE parcels SET deleted = 1 WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Atomically bind an unowned parcel to a user.
    ///
    /// The compare-and-swap `WHERE` clause mirrors assignment: of two
    /// concurrent claims exactly one wins, the loser observes `Ok(false)`.
    ///
    /// Fails with [`StoreError::NotFound`] if the parcel is absent.
    pub fn try_set_parcel_owner(&self, parcel_id: i64, owner_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE parcels SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
            params![owner_id, parcel_id],
        )?;

        if affected == 0 {
            let exists: i64 = self.conn().query_row(
                "SELECT COUNT(*) FROM parcels WHERE id = ?1",
                params![parcel_id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(StoreError::NotFound);
            }
            return Ok(false);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn query_parcels(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Parcel>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_parcel)?;

        let mut parcels = Vec::new();
        for row in rows {
            parcels.push(row?);
        }
        Ok(parcels)
    }
}

/// Recompute the derived availability flag: an agent is available iff no
/// non-terminal parcel is assigned to them.  Shared by every status-changing
/// code path.
pub(crate) fn recompute_availability(conn: &Connection, agent_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE agents
         SET available = NOT EXISTS (
             SELECT 1 FROM parcels
             WHERE agent_id = ?1 AND status IN ('PENDING', 'IN_TRANSIT')
         )
         WHERE id = ?1",
        params![agent_id],
    )?;
    Ok(())
}

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::from(other),
    }
}

/// Map a `rusqlite::Row` to a [`Parcel`].
fn row_to_parcel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Parcel> {
    let status_str: String = row.get(4)?;
    let sent_str: String = row.get(5)?;
    let delivered_str: Option<String> = row.get(6)?;

    let status = ParcelStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown parcel status: {status_str}").into(),
        )
    })?;

    let sent_at = parse_ts(&sent_str, 5)?;
    let delivered_at = delivered_str.as_deref().map(|s| parse_ts(s, 6)).transpose()?;

    Ok(Parcel {
        id: row.get(0)?,
        tracking_number: row.get(1)?,
        description: row.get(2)?,
        weight: row.get(3)?,
        status,
        sent_at,
        delivered_at,
        deleted: row.get(7)?,
        address_id: row.get(8)?,
        agent_id: row.get(9)?,
        owner_id: row.get(10)?,
    })
}

pub(crate) fn parse_ts(s: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_agent, sample_client, sample_parcel, test_db};

    #[test]
    fn insert_and_fetch_by_tracking_number() {
        let db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-1")).unwrap();

        let found = db.get_parcel_by_tracking_number("tn-1").unwrap();
        assert_eq!(found.id, parcel.id);
        assert_eq!(found.status, ParcelStatus::Pending);
        assert!(found.agent_id.is_none());
    }

    #[test]
    fn duplicate_tracking_number_is_conflict() {
        let db = test_db();
        db.insert_parcel(&sample_parcel("tn-dup")).unwrap();
        let err = db.insert_parcel(&sample_parcel("tn-dup")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn soft_deleted_parcel_hidden_from_listing_but_fetchable() {
        let db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-2")).unwrap();

        db.soft_delete_parcel(parcel.id).unwrap();

        assert!(db.list_active_parcels().unwrap().is_empty());
        let fetched = db.get_parcel(parcel.id).unwrap();
        assert!(fetched.deleted);
    }

    #[test]
    fn assign_wins_once_and_flips_availability() {
        let mut db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-3")).unwrap();
        let agent_a = sample_agent(&db, "a@colis.test");
        let agent_b = sample_agent(&db, "b@colis.test");

        assert!(db.try_assign_parcel(parcel.id, agent_a).unwrap());
        // Second attempt (other agent) loses the CAS.
        assert!(!db.try_assign_parcel(parcel.id, agent_b).unwrap());

        let parcel = db.get_parcel(parcel.id).unwrap();
        assert_eq!(parcel.status, ParcelStatus::InTransit);
        assert_eq!(parcel.agent_id, Some(agent_a));

        assert!(!db.get_agent(agent_a).unwrap().available);
        assert!(db.get_agent(agent_b).unwrap().available);
        assert!(db.list_unassigned_parcels().unwrap().is_empty());
    }

    #[test]
    fn assign_missing_rows_is_not_found() {
        let mut db = test_db();
        let agent = sample_agent(&db, "c@colis.test");
        assert!(matches!(
            db.try_assign_parcel(999, agent),
            Err(StoreError::NotFound)
        ));

        let parcel = db.insert_parcel(&sample_parcel("tn-4")).unwrap();
        assert!(matches!(
            db.try_assign_parcel(parcel.id, 999),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn transition_to_delivered_sets_timestamp_once() {
        let mut db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-5")).unwrap();
        let agent = sample_agent(&db, "d@colis.test");
        db.try_assign_parcel(parcel.id, agent).unwrap();

        let first = Utc::now();
        db.transition_parcel(parcel.id, ParcelStatus::Delivered, Some(first))
            .unwrap();
        let delivered = db.get_parcel(parcel.id).unwrap().delivered_at.unwrap();

        // A later write must not move the first timestamp.
        db.transition_parcel(parcel.id, ParcelStatus::Delivered, Some(Utc::now()))
            .unwrap();
        assert_eq!(db.get_parcel(parcel.id).unwrap().delivered_at, Some(delivered));

        // Availability restored: no open parcels remain.
        assert!(db.get_agent(agent).unwrap().available);
    }

    #[test]
    fn owner_listing_scopes_to_one_user() {
        let db = test_db();
        let owner_a = sample_client(&db, "own-a@colis.test");
        let owner_b = sample_client(&db, "own-b@colis.test");
        let mut mine = sample_parcel("tn-own-1");
        mine.owner_id = Some(owner_a);
        db.insert_parcel(&mine).unwrap();
        let mut theirs = sample_parcel("tn-own-2");
        theirs.owner_id = Some(owner_b);
        db.insert_parcel(&theirs).unwrap();
        db.insert_parcel(&sample_parcel("tn-own-3")).unwrap();

        let owned = db.list_parcels_for_owner(owner_a).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].tracking_number, "tn-own-1");
    }

    #[test]
    fn claim_cas_wins_once() {
        let db = test_db();
        let parcel = db.insert_parcel(&sample_parcel("tn-claim")).unwrap();
        let owner_a = sample_client(&db, "claim-a@colis.test");
        let owner_b = sample_client(&db, "claim-b@colis.test");

        assert!(db.try_set_parcel_owner(parcel.id, owner_a).unwrap());
        // Second claimant loses; the owner is unchanged.
        assert!(!db.try_set_parcel_owner(parcel.id, owner_b).unwrap());
        assert_eq!(db.get_parcel(parcel.id).unwrap().owner_id, Some(owner_a));

        assert!(matches!(
            db.try_set_parcel_owner(999, owner_a),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn agent_counts_skip_deleted_parcels() {
        let mut db = test_db();
        let agent = sample_agent(&db, "counts@colis.test");

        let kept = db.insert_parcel(&sample_parcel("tn-keep")).unwrap();
        let doomed = db.insert_parcel(&sample_parcel("tn-doom")).unwrap();
        db.try_assign_parcel(kept.id, agent).unwrap();
        db.try_assign_parcel(doomed.id, agent).unwrap();
        db.soft_delete_parcel(doomed.id).unwrap();

        // Counts and recents agree with the visible listing.
        assert_eq!(db.count_parcels_for_agent(agent).unwrap(), 1);
        assert_eq!(
            db.count_parcels_for_agent_with_status(agent, ParcelStatus::InTransit)
                .unwrap(),
            1
        );
        assert_eq!(db.recent_parcels_for_agent(agent, 5).unwrap().len(), 1);
        assert_eq!(db.list_parcels_for_agent(agent).unwrap().len(), 1);
    }

    #[test]
    fn recent_parcels_ordered_by_send_date() {
        let mut db = test_db();
        let agent = sample_agent(&db, "e@colis.test");

        for i in 0..3 {
            let mut p = sample_parcel(&format!("tn-recent-{i}"));
            p.sent_at = Utc::now() - chrono::Duration::hours(3 - i);
            let p = db.insert_parcel(&p).unwrap();
            db.try_assign_parcel(p.id, agent).unwrap();
        }

        let recent = db.recent_parcels_for_agent(agent, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].sent_at >= recent[1].sent_at);
        assert_eq!(db.count_parcels_for_agent(agent).unwrap(), 3);
        assert_eq!(
            db.count_parcels_for_agent_with_status(agent, ParcelStatus::InTransit)
                .unwrap(),
            3
        );
    }
}
