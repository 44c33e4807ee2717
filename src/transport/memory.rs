use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use super::{Failure, FileService, Outcome};
use crate::models::FileRecord;
use crate::session::Credential;

/// Remote operations, used to target injected failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Upload,
    TogglePrivacy,
    Delete,
    FetchShared,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    failure: Failure,
    /// Apply the mutation first, then report the failure
    after_apply: bool,
}

#[derive(Default)]
struct MemoryState {
    tokens: HashSet<String>,
    files: Vec<FileRecord>,
    contents: HashMap<String, Bytes>,
    calls: HashMap<Operation, usize>,
    injected: HashMap<Operation, InjectedFailure>,
    latency: HashMap<Operation, Duration>,
}

/// In-process file service with the same semantics as the remote one.
/// Intended for development and testing.
pub struct InMemoryFileService {
    base_url: String,
    rng: SystemRandom,
    state: Mutex<MemoryState>,
}

impl InMemoryFileService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            rng: SystemRandom::new(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept `token` as a valid bearer credential.
    pub fn authorize(&self, token: &str) {
        self.state().tokens.insert(token.to_string());
    }

    /// Stop accepting `token`; later calls with it answer 401.
    pub fn revoke(&self, token: &str) {
        self.state().tokens.remove(token);
    }

    /// Delay calls of `op` by `latency` before they touch any state.
    pub fn set_latency(&self, op: Operation, latency: Duration) {
        self.state().latency.insert(op, latency);
    }

    /// Fail the next call of `op` without applying it.
    pub fn fail_next(&self, op: Operation, failure: Failure) {
        self.state().injected.insert(
            op,
            InjectedFailure {
                failure,
                after_apply: false,
            },
        );
    }

    /// Apply the next call of `op`, then report `failure` anyway.
    pub fn fail_next_after_apply(&self, op: Operation, failure: Failure) {
        self.state().injected.insert(
            op,
            InjectedFailure {
                failure,
                after_apply: true,
            },
        );
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Current server-side records, in listing order.
    pub fn files(&self) -> Vec<FileRecord> {
        self.state().files.clone()
    }

    pub fn find_by_name(&self, filename: &str) -> Option<FileRecord> {
        self.state()
            .files
            .iter()
            .find(|f| f.filename == filename)
            .cloned()
    }

    fn new_share_id(&self) -> Result<String, Failure> {
        let mut buf = [0u8; 12];
        self.rng
            .fill(&mut buf)
            .map_err(|_| Failure::http(500, "Failed to generate share id"))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
    }

    /// Wait out the configured latency, count the call, and check the credential.
    async fn enter(&self, op: Operation, credential: Option<&Credential>) -> Outcome<()> {
        let latency = self.state().latency.get(&op).copied().unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        *state.calls.entry(op).or_insert(0) += 1;

        if let Some(credential) = credential {
            if !state.tokens.contains(credential.token()) {
                return Err(Failure::unauthorized("Invalid or expired token"));
            }
        }

        let armed_before = state
            .injected
            .get(&op)
            .is_some_and(|injected| !injected.after_apply);
        if armed_before {
            if let Some(injected) = state.injected.remove(&op) {
                return Err(injected.failure);
            }
        }

        Ok(())
    }

    /// Report an after-apply failure for `op`, if one is armed.
    fn leave(&self, op: Operation) -> Outcome<()> {
        match self.state().injected.remove(&op) {
            Some(injected) => Err(injected.failure),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryFileService {
    fn default() -> Self {
        Self::new("memory://files")
    }
}

#[async_trait]
impl FileService for InMemoryFileService {
    async fn list_files(&self, credential: &Credential) -> Outcome<Vec<FileRecord>> {
        self.enter(Operation::List, Some(credential)).await?;
        let files = self.files();
        self.leave(Operation::List)?;
        Ok(files)
    }

    async fn upload_file(
        &self,
        credential: &Credential,
        data: Bytes,
        filename: &str,
    ) -> Outcome<String> {
        self.enter(Operation::Upload, Some(credential)).await?;

        if filename.trim().is_empty() {
            return Err(Failure::http(400, "No file uploaded"));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let record = FileRecord {
            id: id.clone(),
            filename: filename.to_string(),
            file_url: format!("{}/uploads/{id}/{filename}", self.base_url),
            is_public: false,
            share_id: None,
            created_at: Utc::now(),
        };

        {
            let mut state = self.state();
            state.contents.insert(id.clone(), data);
            state.files.push(record);
        }

        tracing::debug!(file_id = %id, filename, "Stored file");
        self.leave(Operation::Upload)?;
        Ok("File uploaded successfully".to_string())
    }

    async fn toggle_privacy(&self, credential: &Credential, id: &str) -> Outcome<String> {
        self.enter(Operation::TogglePrivacy, Some(credential)).await?;

        let share_id = self.new_share_id()?;
        let message = {
            let mut state = self.state();
            let file = state
                .files
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| Failure::not_found("File not found"))?;

            file.is_public = !file.is_public;
            if file.is_public {
                file.share_id = Some(share_id);
                "File is now public"
            } else {
                file.share_id = None;
                "File is now private"
            }
        };

        self.leave(Operation::TogglePrivacy)?;
        Ok(message.to_string())
    }

    async fn delete_file(&self, credential: &Credential, id: &str) -> Outcome<String> {
        self.enter(Operation::Delete, Some(credential)).await?;

        {
            let mut state = self.state();
            let index = state
                .files
                .iter()
                .position(|f| f.id == id)
                .ok_or_else(|| Failure::not_found("File not found"))?;
            state.files.remove(index);
            state.contents.remove(id);
        }

        self.leave(Operation::Delete)?;
        Ok("File deleted successfully".to_string())
    }

    async fn fetch_shared(&self, share_id: &str) -> Outcome<Bytes> {
        self.enter(Operation::FetchShared, None).await?;

        let state = self.state();
        let file = state
            .files
            .iter()
            .find(|f| f.share_id() == Some(share_id))
            .ok_or_else(|| Failure::not_found("File not found or not public"))?;

        state
            .contents
            .get(&file.id)
            .cloned()
            .ok_or_else(|| Failure::not_found("File content not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FailureStatus;

    fn service() -> (InMemoryFileService, Credential) {
        let service = InMemoryFileService::default();
        service.authorize("tok");
        (service, Credential::new("tok"))
    }

    #[tokio::test]
    async fn test_toggle_issues_and_revokes_share_id() {
        let (service, cred) = service();
        service
            .upload_file(&cred, Bytes::from("pdf"), "report.pdf")
            .await
            .unwrap();
        let id = service.files()[0].id.clone();

        service.toggle_privacy(&cred, &id).await.unwrap();
        let public = service.files()[0].clone();
        assert!(public.is_public);
        let share_id = public.share_id.clone().expect("public file has share id");

        let content = service.fetch_shared(&share_id).await.unwrap();
        assert_eq!(content, Bytes::from("pdf"));

        service.toggle_privacy(&cred, &id).await.unwrap();
        let private = service.files()[0].clone();
        assert!(!private.is_public);
        assert_eq!(private.share_id, None);

        let err = service.fetch_shared(&share_id).await.unwrap_err();
        assert_eq!(err.status, FailureStatus::Http(404));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let (service, _) = service();
        let err = service
            .list_files(&Credential::new("other"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let (service, cred) = service();
        service.fail_next(Operation::List, Failure::network("connection reset"));

        assert!(service.list_files(&cred).await.is_err());
        assert!(service.list_files(&cred).await.is_ok());
        assert_eq!(service.calls(Operation::List), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_not_found() {
        let (service, cred) = service();
        let err = service.delete_file(&cred, "missing").await.unwrap_err();
        assert_eq!(err.status, FailureStatus::Http(404));
        assert_eq!(err.message, "File not found");
    }
}
