//! Session context: the bearer credential and its lifecycle.
//!
//! A `Session` is created once at startup and shared (behind an `Arc`) with
//! everything that talks to the file service. It is cleared on logout and on
//! any unauthorized response; clearing is idempotent so racing requests may
//! all trigger it.

use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::storage::{Database, DatabaseError};

/// Bearer token proving the caller's identity to the file service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// No credential is held, or the server rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Not authenticated")]
pub struct Unauthenticated;

pub struct Session {
    credential: RwLock<Option<Credential>>,
    store: Option<Database>,
}

impl Session {
    /// A session that lives only as long as the process.
    pub fn in_memory(credential: Option<Credential>) -> Self {
        Self {
            credential: RwLock::new(credential),
            store: None,
        }
    }

    /// A session backed by the credential database. The stored token is loaded
    /// immediately; `set` and `clear` write through.
    pub fn persistent(db: Database) -> Result<Self, DatabaseError> {
        let credential = db.load_credential()?.map(|c| Credential::new(c.token));
        Ok(Self {
            credential: RwLock::new(credential),
            store: Some(db),
        })
    }

    /// Session guard: the current credential, or `Unauthenticated`.
    pub fn require(&self) -> Result<Credential, Unauthenticated> {
        self.current().ok_or(Unauthenticated)
    }

    pub fn current(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Install a credential obtained by an external login flow.
    pub fn set(&self, credential: Credential) -> Result<(), DatabaseError> {
        if let Some(ref db) = self.store {
            db.save_credential(credential.token())?;
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    /// Drop the credential. Returns whether one was held.
    pub fn clear(&self) -> bool {
        let previous = self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(ref db) = self.store {
            if let Err(e) = db.clear_credential() {
                tracing::warn!(error = %e, "Failed to remove stored credential");
            }
        }

        previous.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_without_credential() {
        let session = Session::in_memory(None);
        assert_eq!(session.require(), Err(Unauthenticated));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_set_then_clear_is_idempotent() {
        let session = Session::in_memory(None);
        session.set(Credential::new("tok")).unwrap();
        assert_eq!(session.require().unwrap().token(), "tok");

        assert!(session.clear());
        assert!(!session.clear());
        assert!(session.require().is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_persistent_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let db = Database::open(dir.path()).unwrap();
            let session = Session::persistent(db).unwrap();
            assert!(!session.is_authenticated());
            session.set(Credential::new("kept")).unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        let session = Session::persistent(db).unwrap();
        assert_eq!(session.require().unwrap().token(), "kept");

        assert!(session.clear());
        drop(session);

        let db = Database::open(dir.path()).unwrap();
        assert!(db.load_credential().unwrap().is_none());
    }
}
