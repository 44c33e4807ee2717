use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::db::{Database, DatabaseError};
use super::tables::*;

/// A bearer token as persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

impl Database {
    /// Store the active token, replacing any previous one
    pub fn save_credential(&self, token: &str) -> Result<(), DatabaseError> {
        debug_assert!(!token.is_empty(), "token must not be empty");

        let stored = StoredCredential {
            token: token.to_string(),
            saved_at: Utc::now(),
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            let data = rmp_serde::to_vec_named(&stored)?;
            table.insert(CURRENT_SLOT, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn load_credential(&self) -> Result<Option<StoredCredential>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;

        match table.get(CURRENT_SLOT)? {
            Some(data) => {
                let stored: StoredCredential = rmp_serde::from_slice(data.value())?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    /// Remove the active token. Returns whether one was stored.
    pub fn clear_credential(&self) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            let result = table.remove(CURRENT_SLOT)?.is_some();
            result
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
