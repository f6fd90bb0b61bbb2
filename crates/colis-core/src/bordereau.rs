//! Shipment-note issuance and the document-rendering boundary.

use thiserror::Error;

use colis_store::{Address, Database, Parcel, ShipmentNote};

use crate::error::Result;

/// Everything a renderer needs to lay out one shipment note.
#[derive(Debug, Clone)]
pub struct BordereauData {
    pub parcel: Parcel,
    pub address: Option<Address>,
    pub note: ShipmentNote,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("document rendering failed: {0}")]
    Render(String),
}

/// Turns a shipment note into a PDF byte stream.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, data: &BordereauData) -> std::result::Result<Vec<u8>, RenderError>;
}

/// Collect the parcel, its destination address and its shipment note,
/// creating the note on first request.  The generation timestamp is fixed by
/// that first request and reused afterwards.
pub fn issue_note(db: &Database, parcel_id: i64) -> Result<BordereauData> {
    let parcel = db.get_parcel(parcel_id)?;
    let note = db.get_or_create_note(parcel_id)?;
    let address = match parcel.address_id {
        Some(address_id) => Some(db.get_address(address_id)?),
        None => None,
    };

    Ok(BordereauData {
        parcel,
        address,
        note,
    })
}

/// Download filename for a rendered note.
pub fn attachment_filename(parcel: &Parcel) -> String {
    format!("bordereau_{}.pdf", parcel.tracking_number)
}
