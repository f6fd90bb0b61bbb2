//! # colis-core
//!
//! Domain logic for the Colis delivery administration backend: the parcel
//! lifecycle manager (creation, assignment, status transitions, soft
//! deletion, claiming), the agent directory, the authentication gate and
//! shipment-note issuance.
//!
//! The crate operates on a [`colis_store::Database`] handle and never talks
//! to the outside world directly: document rendering and mail delivery are
//! behind the [`bordereau::DocumentRenderer`] and [`mailer::MailSender`]
//! traits so callers choose the implementations.

pub mod auth;
pub mod bordereau;
pub mod directory;
pub mod lifecycle;
pub mod mailer;
pub mod password;
pub mod status;

mod error;

pub use error::{AuthError, CoreError, Result};
