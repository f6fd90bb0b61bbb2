//! Development mail delivery: log instead of send.

use tracing::info;

use colis_core::mailer::{MailError, MailSender};

/// Logs the recipient and subject at info level.  The body is intentionally
/// never logged; for agent creation it carries the generated password.
pub struct LogMailer;

impl MailSender for LogMailer {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        info!(to, subject, "mail delivery skipped (log mailer)");
        Ok(())
    }
}
