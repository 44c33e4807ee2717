//! The locally held file collection.
//!
//! The collection is only ever replaced wholesale by a successful listing.
//! A failed listing keeps the previous contents and records an error instead.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::models::FileRecord;
use crate::session::Credential;
use crate::transport::{Failure, FailureStatus, FileService};

#[derive(Default)]
struct Held {
    files: Vec<FileRecord>,
    error: Option<String>,
    /// Bumped by `clear`; listings started under an older epoch are dropped.
    epoch: u64,
}

#[derive(Default)]
pub struct CollectionStore {
    held: RwLock<Held>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the authoritative listing and replace the held collection with it.
    ///
    /// Returns the number of records now held. Concurrent refreshes are
    /// last-write-wins; each one is a valid server snapshot.
    pub async fn refresh(
        &self,
        service: &dyn FileService,
        credential: &Credential,
    ) -> Result<usize, Failure> {
        let epoch = self.read().epoch;
        let result = service.list_files(credential).await;

        let mut held = self.held.write().unwrap_or_else(PoisonError::into_inner);
        if held.epoch != epoch {
            tracing::debug!("Dropping listing that raced with a collection reset");
            return result.map(|_| held.files.len());
        }

        match result {
            Ok(files) => {
                held.files = normalize(files);
                held.error = None;
                Ok(held.files.len())
            }
            Err(failure) => {
                held.error = Some(match failure.status {
                    FailureStatus::Http(code) => format!("Failed to fetch files: {code}"),
                    FailureStatus::Network => "Network error fetching files".to_string(),
                    FailureStatus::Timeout | FailureStatus::Cancelled => {
                        format!("Failed to fetch files: {}", failure.message)
                    }
                });
                Err(failure)
            }
        }
    }

    /// Discard everything, including any listing still in flight.
    pub fn clear(&self) {
        let mut held = self.held.write().unwrap_or_else(PoisonError::into_inner);
        held.files.clear();
        held.error = None;
        held.epoch += 1;
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.read().files.clone()
    }

    pub fn get(&self, id: &str) -> Option<FileRecord> {
        self.read().files.iter().find(|f| f.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().files.is_empty()
    }

    /// The global error string shown above the collection.
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.held
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.held
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .error = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Held> {
        self.held.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keep the first occurrence of every id and flag records that break the
/// share invariant.
fn normalize(files: Vec<FileRecord>) -> Vec<FileRecord> {
    let mut seen = HashSet::with_capacity(files.len());
    files
        .into_iter()
        .filter(|file| {
            if !seen.insert(file.id.clone()) {
                tracing::warn!(file_id = %file.id, "Duplicate id in listing, keeping first");
                return false;
            }
            if !file.is_consistent() {
                tracing::warn!(
                    file_id = %file.id,
                    is_public = file.is_public,
                    "Listing record has shareId out of step with isPublic"
                );
            }
            true
        })
        .collect()
}
