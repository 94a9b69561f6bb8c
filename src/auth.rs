use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{AuthError, ValidationError};
use crate::models::{new_id, User};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a plain password with argon2id.
fn hash_password(password: &str) -> Result<String> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Session state for the process. Built once in `main` from the opened
/// database and handed to whatever needs the current identity.
pub struct SessionProvider<'a> {
    db: &'a Database,
}

impl<'a> SessionProvider<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Creates the account and signs it in.
    pub fn create_account(&self, email: &str, password: &str, name: &str) -> Result<User> {
        let email = email.trim();
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        if !email_pattern().is_match(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()).into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN).into());
        }
        if self.db.find_user_by_email(email)?.is_some() {
            return Err(AuthError::AccountExists(email.to_string()).into());
        }

        let user = User {
            id: new_id(),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.db.insert_user(&user, &hash_password(password)?)?;
        info!(user = %user.id, "account created");

        self.login(email, password)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let Some((user, hash)) = self.db.find_user_by_email(email.trim())? else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };
        if !verify_password(password, &hash) {
            debug!(user = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        self.db.start_session(&new_id(), &user.id)?;
        info!(user = %user.id, "session started");
        Ok(user)
    }

    /// Any failure reading the session counts as "not logged in".
    pub fn current_user(&self) -> Option<User> {
        match self.db.current_session_user() {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "failed to read current session");
                None
            }
        }
    }

    pub fn require_user(&self) -> Result<User> {
        self.current_user().ok_or_else(|| AuthError::NotLoggedIn.into())
    }

    pub fn logout(&self) -> Result<()> {
        if !self.db.end_current_session()? {
            return Err(AuthError::NotLoggedIn.into());
        }
        info!("session ended");
        Ok(())
    }
}
