//! Authentication gate.
//!
//! Verifies credentials against stored argon2 hashes and produces an
//! [`Identity`], the request-scoped context object handed to every handler
//! that needs to know who is calling.  There is deliberately no plaintext
//! fallback: a stored value that does not parse as a PHC hash fails
//! authentication hard, and [`rehash_legacy_passwords`] exists to migrate
//! such rows offline before the gate goes live.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use colis_store::{Database, Role, StoreError, User};

use crate::error::{AuthError, CoreError, Result};
use crate::password::{hash_password, is_phc_hash, verify_password};

/// The authenticated caller, resolved once at login and carried explicitly
/// instead of being fished out of a session by the domain layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Set when the account is linked to a delivery agent.
    pub agent_id: Option<i64>,
}

/// Verify credentials and return the caller's identity.
///
/// Distinct failures ([`AuthError`]) are preserved for logging; the HTTP
/// layer collapses them into one 401 so the response does not reveal which
/// part was wrong.
pub fn authenticate(db: &Database, email: &str, password: &str) -> Result<Identity> {
    let user = match db.get_user_by_email(email) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AuthError::NotFound.into()),
        Err(e) => return Err(e.into()),
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(AuthError::BadPassword.into()),
        Err(()) => {
            tracing::error!(
                email,
                "stored password hash is not a PHC string; run the password migration"
            );
            return Err(AuthError::MalformedStoredHash.into());
        }
    }

    db.touch_last_login(user.id, Utc::now())?;

    let agent_id = db.get_agent_for_user(user.id)?.map(|a| a.id);
    tracing::info!(user_id = user.id, role = user.role.as_str(), "login");

    Ok(Identity {
        user_id: user.id,
        email: user.email,
        role: user.role,
        agent_id,
    })
}

/// Register a new account.  The email must be unused and the password is
/// hashed before it is persisted.
pub fn register(
    db: &Database,
    nom: &str,
    prenom: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    if !email.contains('@') || !email.contains('.') {
        return Err(CoreError::Validation(format!("malformed email: {email}")));
    }
    if password.len() < 8 {
        return Err(CoreError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    match db.get_user_by_email(email) {
        Ok(_) => {
            return Err(CoreError::Conflict(format!(
                "email already registered: {email}"
            )))
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let hash = hash_password(password)?;
    let user = db.insert_user(nom, prenom, email, &hash, role)?;
    tracing::info!(user_id = user.id, "account registered");
    Ok(user)
}

/// One-time offline migration: rehash every stored value that is not a valid
/// PHC string, treating it as legacy plaintext.  Returns how many rows were
/// rewritten.
pub fn rehash_legacy_passwords(db: &Database) -> Result<usize> {
    let mut migrated = 0;
    for user in db.list_users()? {
        if is_phc_hash(&user.password_hash) {
            continue;
        }
        let hash = hash_password(&user.password_hash)?;
        db.set_user_password_hash(user.id, &hash)?;
        migrated += 1;
        tracing::warn!(user_id = user.id, "legacy plaintext password rehashed");
    }
    tracing::info!(migrated, "password migration finished");
    Ok(migrated)
}
