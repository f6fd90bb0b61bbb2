//! Out-of-band mail delivery boundary.
//!
//! The only caller today is agent creation, which mails the generated
//! password.  Implementations must never log message bodies.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Sends a plain-text message to a single recipient.
pub trait MailSender: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
