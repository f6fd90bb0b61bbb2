//! Aggregate queries for the admin dashboard.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::ParcelStatus;

impl Database {
    /// Number of parcels delivered at or after `since`.
    pub fn count_delivered_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM parcels
             WHERE status = 'DELIVERED' AND delivered_at >= ?1",
            params![since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of parcels currently holding a given status (soft-deleted
    /// excluded).
    pub fn count_with_status(&self, status: ParcelStatus) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM parcels WHERE status = ?1 AND deleted = 0",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Per-status counts over all active parcels.
    pub fn count_parcels_per_status(&self) -> Result<HashMap<ParcelStatus, i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT status, COUNT(*) FROM parcels WHERE deleted = 0 GROUP BY status",
        )?;

        let rows = stmt.query_map([], |row| {
            let status_str: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status_str, count))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = ParcelStatus::parse(&status_str) {
                counts.insert(status, count);
            }
        }
        Ok(counts)
    }
}
