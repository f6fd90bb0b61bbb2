//! Agent directory: administration of delivery agents and their accounts.

use colis_store::{Agent, Database, User};

use crate::error::{CoreError, Result};
use crate::mailer::MailSender;
use crate::password::{generate_password, hash_password};

/// Create a delivery agent with a fresh user account.
///
/// A random password is generated, delivered out-of-band through `mailer`,
/// then argon2-hashed before anything touches the store.  The plaintext is
/// never persisted or logged.  Mail failure aborts the creation: an agent
/// who never received their password cannot log in.
pub fn create_agent(
    db: &mut Database,
    mailer: &dyn MailSender,
    nom: &str,
    prenom: &str,
    email: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(User, Agent)> {
    validate_email(email)?;

    let plaintext = generate_password();

    let subject = "Votre compte livreur - mot de passe";
    let body = format!(
        "Bonjour {prenom},\n\nVotre compte livreur a été créé.\nVotre mot de passe est : {plaintext}\n"
    );
    mailer
        .send(email, subject, &body)
        .map_err(|e| CoreError::Mail(e.to_string()))?;

    let hash = hash_password(&plaintext)?;
    let (user, agent) = db.insert_agent(nom, prenom, email, &hash, latitude, longitude)?;

    tracing::info!(agent_id = agent.id, email, "agent account created");
    Ok((user, agent))
}

/// Update an agent's profile and coordinates.
///
/// The backing account keeps its Livreur role no matter what the caller
/// submits, and the password only changes when a new one is explicitly
/// supplied.
pub fn update_agent(
    db: &Database,
    agent_id: i64,
    nom: &str,
    prenom: &str,
    email: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    new_password: Option<&str>,
) -> Result<Agent> {
    validate_email(email)?;

    let agent = db.get_agent(agent_id)?;
    db.update_user_profile(agent.user_id, nom, prenom, email)?;
    db.update_agent_position(agent_id, latitude, longitude)?;

    if let Some(plaintext) = new_password {
        if plaintext.is_empty() {
            return Err(CoreError::Validation("new password is empty".to_string()));
        }
        let hash = hash_password(plaintext)?;
        db.set_user_password_hash(agent.user_id, &hash)?;
    }

    Ok(db.get_agent(agent_id)?)
}

/// Remove an agent and its user account together.
pub fn delete_agent(db: &mut Database, agent_id: i64) -> Result<()> {
    if !db.delete_agent(agent_id)? {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let well_formed = email.contains('@') && email.contains('.') && !email.starts_with('@');
    if !well_formed {
        return Err(CoreError::Validation(format!("malformed email: {email}")));
    }
    Ok(())
}
