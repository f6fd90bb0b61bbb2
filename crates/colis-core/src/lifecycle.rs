//! Parcel lifecycle manager.
//!
//! Owns parcel creation, tracking-number issuance, agent assignment, status
//! transitions, edits, soft deletion and claiming.  Every status change goes
//! through the transition table in [`crate::status`] and through the store's
//! shared transition handler, which recomputes the assigned agent's
//! availability in the same transaction.

use chrono::Utc;
use uuid::Uuid;

use colis_store::{AddressInput, Database, Parcel, ParcelStatus};

use crate::error::{CoreError, Result};
use crate::status::can_transition;

/// Create a new parcel: fresh tracking number, status Pending, sent now.
///
/// The owner is optional; a parcel created without one can be claimed later
/// through [`claim_parcel`].
pub fn create_parcel(
    db: &Database,
    description: &str,
    weight: f64,
    address: &AddressInput,
    owner_id: Option<i64>,
) -> Result<Parcel> {
    validate_weight(weight)?;

    let stored_address = db.insert_address(address)?;

    let parcel = Parcel {
        id: 0,
        tracking_number: Uuid::new_v4().to_string(),
        description: description.to_string(),
        weight,
        status: ParcelStatus::Pending,
        sent_at: Utc::now(),
        delivered_at: None,
        deleted: false,
        address_id: Some(stored_address.id),
        agent_id: None,
        owner_id,
    };

    let parcel = db.insert_parcel(&parcel)?;
    tracing::info!(
        parcel_id = parcel.id,
        tracking_number = %parcel.tracking_number,
        "parcel created"
    );
    Ok(parcel)
}

/// Assign a pending, unassigned parcel to an agent.
///
/// The parcel moves to InTransit and the agent becomes unavailable, both in
/// one transaction.  A parcel that is already assigned, soft-deleted or past
/// Pending yields [`CoreError::Conflict`]; of two concurrent calls for the
/// same parcel exactly one succeeds.
pub fn assign_parcel(db: &mut Database, parcel_id: i64, agent_id: i64) -> Result<()> {
    let won = db.try_assign_parcel(parcel_id, agent_id)?;
    if !won {
        return Err(CoreError::Conflict(format!(
            "parcel {parcel_id} is not awaiting assignment"
        )));
    }
    Ok(())
}

/// Move a parcel to a new status.
///
/// Illegal transitions are rejected with [`CoreError::Conflict`].  Reaching
/// Delivered records the delivery timestamp; the store keeps the first one if
/// a timestamp was ever written.  The assigned agent's availability is
/// recomputed on every transition, so agents never stay stuck unavailable
/// when their parcel leaves the open states through any path.
pub fn update_status(db: &mut Database, parcel_id: i64, new_status: ParcelStatus) -> Result<()> {
    let parcel = db.get_parcel(parcel_id)?;

    if !can_transition(parcel.status, new_status) {
        return Err(CoreError::Conflict(format!(
            "illegal transition {} -> {}",
            parcel.status.as_str(),
            new_status.as_str()
        )));
    }

    let delivered = (new_status == ParcelStatus::Delivered).then(Utc::now);
    db.transition_parcel(parcel_id, new_status, delivered)?;
    Ok(())
}

/// Mark a parcel delivered.  Sugar for [`update_status`] with Delivered;
/// the agent becomes available again once no open parcel remains assigned.
pub fn complete_delivery(db: &mut Database, parcel_id: i64) -> Result<()> {
    update_status(db, parcel_id, ParcelStatus::Delivered)
}

/// Overwrite a parcel's description, weight, status and destination address.
///
/// The address is updated in place, or created when the parcel has none.  A
/// status differing from the current one must be a legal transition.
pub fn edit_parcel(
    db: &mut Database,
    parcel_id: i64,
    description: &str,
    weight: f64,
    status: ParcelStatus,
    address: &AddressInput,
) -> Result<Parcel> {
    validate_weight(weight)?;

    let mut parcel = db.get_parcel(parcel_id)?;
    let status_changed = status != parcel.status;

    if status_changed && !can_transition(parcel.status, status) {
        return Err(CoreError::Conflict(format!(
            "illegal transition {} -> {}",
            parcel.status.as_str(),
            status.as_str()
        )));
    }

    match parcel.address_id {
        Some(address_id) => db.update_address(address_id, address)?,
        None => {
            let stored = db.insert_address(address)?;
            parcel.address_id = Some(stored.id);
        }
    }

    parcel.description = description.to_string();
    parcel.weight = weight;
    db.update_parcel(&parcel)?;

    if status_changed {
        let delivered = (status == ParcelStatus::Delivered).then(Utc::now);
        db.transition_parcel(parcel_id, status, delivered)?;
    }

    Ok(db.get_parcel(parcel_id)?)
}

/// Flag a parcel as deleted.  The record stays queryable by id but leaves
/// every active listing.
pub fn soft_delete(db: &Database, parcel_id: i64) -> Result<()> {
    db.soft_delete_parcel(parcel_id)?;
    tracing::info!(parcel_id, "parcel soft-deleted");
    Ok(())
}

/// Bind a parcel to a user via its tracking number.
///
/// The tracking number acts as a bearer secret: only unowned parcels can be
/// claimed, and re-claiming one's own parcel is a no-op.  A parcel owned by
/// someone else yields [`CoreError::Conflict`].
pub fn claim_parcel(db: &Database, tracking_number: &str, user_id: i64) -> Result<Parcel> {
    let parcel = db.get_parcel_by_tracking_number(tracking_number)?;

    match parcel.owner_id {
        Some(owner) if owner == user_id => Ok(parcel),
        Some(_) => Err(CoreError::Conflict(
            "parcel already belongs to another account".to_string(),
        )),
        None => {
            if db.try_set_parcel_owner(parcel.id, user_id)? {
                tracing::info!(parcel_id = parcel.id, user_id, "parcel claimed");
                return Ok(db.get_parcel(parcel.id)?);
            }
            // Another claim won between the read and the write.
            let parcel = db.get_parcel(parcel.id)?;
            match parcel.owner_id {
                Some(owner) if owner == user_id => Ok(parcel),
                _ => Err(CoreError::Conflict(
                    "parcel already belongs to another account".to_string(),
                )),
            }
        }
    }
}

fn validate_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(CoreError::Validation(format!(
            "weight must be a non-negative number, got {weight}"
        )));
    }
    Ok(())
}
