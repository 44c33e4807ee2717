//! The file dashboard: session guard, collection, action locks and
//! notifications wired into one control flow.
//!
//! Every mutating action runs the same sequence:
//! session check -> lock -> remote call (timeout + cancellation) ->
//! reconcile from the list endpoint -> release -> notify.


use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::collection::CollectionStore;
use crate::config::Config;
use crate::locks::{ActionLocks, LockKey};
use crate::models::{FileRecord, Privacy};
use crate::notify::{Notification, NotificationSink};
use crate::session::{Credential, Session};
use crate::share::{resolve_share_url, Clipboard};
use crate::state_machine::{ConfirmedDelete, DeleteFlow};
use crate::transport::{Failure, FailureStatus, FileService, Outcome};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first listing.
    Loading,
    Ready,
    /// No usable credential; the collection has been discarded.
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Session expired, please log in again")]
    Unauthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    RemoteRejected { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    TimedOut,
    #[error("Action cancelled")]
    Cancelled,
    #[error("An action is already in progress for {0}")]
    Busy(String),
}

impl From<Failure> for ActionError {
    fn from(failure: Failure) -> Self {
        match failure.status {
            FailureStatus::Http(401) => ActionError::Unauthenticated,
            FailureStatus::Http(status) => ActionError::RemoteRejected {
                status,
                message: failure.message,
            },
            FailureStatus::Network => ActionError::Network(failure.message),
            FailureStatus::Timeout => ActionError::TimedOut,
            FailureStatus::Cancelled => ActionError::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ActionKind {
    Delete,
    TogglePrivacy,
    Upload,
}

impl ActionKind {
    fn name(self) -> &'static str {
        match self {
            ActionKind::Delete => "delete",
            ActionKind::TogglePrivacy => "toggle-privacy",
            ActionKind::Upload => "upload",
        }
    }

    fn success_description(self, ack: &str) -> String {
        match self {
            ActionKind::Delete => "File deleted successfully".to_string(),
            ActionKind::TogglePrivacy => ack.to_string(),
            ActionKind::Upload => "File uploaded successfully!".to_string(),
        }
    }
}

/// One row of the presentation view.
#[derive(Debug, Clone, PartialEq)]
pub struct FileView {
    pub record: FileRecord,
    /// An action is in flight for this record; its controls should be disabled.
    pub busy: bool,
    /// Present only for public records; no copy affordance otherwise.
    pub share_url: Option<String>,
}

/// Everything a presentation layer needs to render the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub phase: Phase,
    pub files: Vec<FileView>,
    pub uploading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Service base used to build share URLs
    pub share_base: String,
    pub request_timeout: Duration,
    pub max_upload_size: u64,
}

impl DashboardOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            share_base: config.service.base_url.clone(),
            request_timeout: config.request_timeout(),
            max_upload_size: config.max_upload_size,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

pub struct Dashboard {
    clipboard: Arc<dyn Clipboard>,
    collection: CollectionStore,
    locks: ActionLocks,
    notifier: Arc<dyn NotificationSink>,
    options: DashboardOptions,
    phase: RwLock<Phase>,
    service: Arc<dyn FileService>,
    session: Arc<Session>,
}

impl Dashboard {
    pub fn new(
        options: DashboardOptions,
        service: Arc<dyn FileService>,
        session: Arc<Session>,
        notifier: Arc<dyn NotificationSink>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            clipboard,
            collection: CollectionStore::new(),
            locks: ActionLocks::new(),
            notifier,
            options,
            phase: RwLock::new(Phase::Loading),
            service,
            session,
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Initial load. Without a credential this goes straight to
    /// `Unauthenticated` and issues no request.
    pub async fn mount(&self) -> Result<usize, ActionError> {
        let Ok(credential) = self.session.require() else {
            self.invalidate_session();
            return Err(ActionError::Unauthenticated);
        };

        self.set_phase(Phase::Loading);
        let result = self.reconcile(&credential).await;
        if self.session.is_authenticated() {
            self.set_phase(Phase::Ready);
        }
        result
    }

    /// Replace the collection with a fresh listing.
    pub async fn refresh(&self) -> Result<usize, ActionError> {
        let Ok(credential) = self.session.require() else {
            self.invalidate_session();
            return Err(ActionError::Unauthenticated);
        };
        self.reconcile(&credential).await
    }

    pub fn logout(&self) {
        let (_, abandoned) = self.teardown();
        tracing::info!(abandoned, "Logged out");
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    pub async fn upload(&self, filename: &str, data: Bytes) -> Result<String, ActionError> {
        if filename.trim().is_empty() {
            return Err(self.reject_upload("Please select a file".to_string()));
        }
        if data.len() as u64 > self.options.max_upload_size {
            return Err(self.reject_upload(format!(
                "File exceeds maximum upload size of {} bytes",
                self.options.max_upload_size
            )));
        }

        let filename = filename.to_string();
        let result = self
            .dispatch(LockKey::Upload, ActionKind::Upload, |service, credential| {
                self.collection.clear_error();
                async move { service.upload_file(&credential, data, &filename).await }
            })
            .await;

        if let Err(ref e) = result {
            if !matches!(e, ActionError::Busy(_) | ActionError::Unauthenticated) {
                self.collection.record_error(e.to_string());
            }
        }
        result
    }

    /// Flip the privacy of `id` on the server. Not idempotent: two calls
    /// leave the file where it started.
    pub async fn toggle_privacy(&self, id: &str) -> Result<String, ActionError> {
        let id = id.to_string();
        self.dispatch(
            LockKey::Record(id.clone()),
            ActionKind::TogglePrivacy,
            |service, credential| async move { service.toggle_privacy(&credential, &id).await },
        )
        .await
    }

    /// Move `id` to `target`, toggling only if the held record differs.
    ///
    /// The decision uses the last listing; another client changing the file
    /// in between can still make the toggle land on the wrong state.
    pub async fn set_privacy(&self, id: &str, target: Privacy) -> Result<String, ActionError> {
        let record = self.held(id)?;
        if record.privacy() == target {
            let message = format!("File is already {target}");
            self.notifier.notify(Notification::info(message.clone()));
            return Ok(message);
        }
        self.toggle_privacy(id).await
    }

    /// Start the delete confirmation for a held record.
    pub fn request_delete(&self, id: &str) -> Result<DeleteFlow, ActionError> {
        let record = self.held(id)?;
        let mut flow = DeleteFlow::new();
        flow.request(&record)
            .map_err(|e| ActionError::Validation(e.to_string()))?;
        Ok(flow)
    }

    pub async fn delete(&self, confirmed: ConfirmedDelete) -> Result<String, ActionError> {
        let id = confirmed.id().to_string();
        self.dispatch(
            LockKey::Record(id.clone()),
            ActionKind::Delete,
            |service, credential| async move { service.delete_file(&credential, &id).await },
        )
        .await
    }

    /// Signal cancellation to the action in flight for `id`.
    pub fn cancel_action(&self, id: &str) -> bool {
        self.locks.cancel(&LockKey::Record(id.to_string()))
    }

    pub fn cancel_upload(&self) -> bool {
        self.locks.cancel(&LockKey::Upload)
    }

    // ------------------------------------------------------------------------
    // Sharing
    // ------------------------------------------------------------------------

    /// Share URL for the record currently held under `id`.
    pub fn share_url(&self, id: &str) -> Option<String> {
        let record = self.collection.get(id)?;
        resolve_share_url(&self.options.share_base, &record)
    }

    /// Copy the share URL to the clipboard. Failures are reported through the
    /// notification sink only. Returns the copied URL.
    pub async fn copy_share_link(&self, id: &str) -> Option<String> {
        let url = self.share_url(id)?;
        match self.clipboard.write_text(&url).await {
            Ok(()) => {
                self.notifier.notify(Notification::success(
                    "Copied!",
                    "Share link copied to clipboard",
                ));
                Some(url)
            }
            Err(e) => {
                tracing::warn!(file_id = %id, error = %e, "Failed to copy share link");
                self.notifier
                    .notify(Notification::error("Failed to copy link"));
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------------

    pub fn view(&self) -> DashboardView {
        let busy: HashSet<String> = self.locks.busy_ids().into_iter().collect();
        let files = self
            .collection
            .files()
            .into_iter()
            .map(|record| FileView {
                busy: busy.contains(&record.id),
                share_url: resolve_share_url(&self.options.share_base, &record),
                record,
            })
            .collect();

        DashboardView {
            phase: self.phase(),
            files,
            uploading: self.locks.is_uploading(),
            error: self.collection.error(),
        }
    }

    pub fn files(&self) -> Vec<FileRecord> {
        self.collection.files()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.locks.is_busy(id)
    }

    pub fn is_uploading(&self) -> bool {
        self.locks.is_uploading()
    }

    pub fn error(&self) -> Option<String> {
        self.collection.error()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Run one mutating action under its lock.
    async fn dispatch<F, Fut>(
        &self,
        key: LockKey,
        kind: ActionKind,
        call: F,
    ) -> Result<String, ActionError>
    where
        F: FnOnce(Arc<dyn FileService>, Credential) -> Fut,
        Fut: Future<Output = Outcome<String>>,
    {
        let Ok(credential) = self.session.require() else {
            self.invalidate_session();
            return Err(ActionError::Unauthenticated);
        };

        let Some(guard) = self.locks.acquire(key.clone()) else {
            tracing::debug!(action = kind.name(), %key, "Refused, action already in flight");
            return Err(ActionError::Busy(key.to_string()));
        };

        tracing::debug!(action = kind.name(), %key, "Dispatching");
        let outcome = self
            .settle(
                guard.cancellation(),
                call(Arc::clone(&self.service), credential),
            )
            .await;

        let result = match outcome {
            Err(failure) if failure.is_unauthorized() => {
                self.invalidate_session();
                Err(ActionError::Unauthenticated)
            }
            outcome => {
                // The server may have applied a failed mutation, so reconcile
                // on every outcome.
                if let Some(current) = self.session.current() {
                    if let Err(e) = self.reconcile(&current).await {
                        tracing::debug!(action = kind.name(), error = %e, "Reconcile failed");
                    }
                }
                outcome.map_err(ActionError::from)
            }
        };

        drop(guard);
        self.report(kind, &key, &result);
        result
    }

    /// Await `call` under the action timeout, giving up early on cancellation.
    async fn settle<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Outcome<T>>,
    ) -> Outcome<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Failure::cancelled()),
            settled = tokio::time::timeout(self.options.request_timeout, call) => {
                settled.unwrap_or_else(|_| Err(Failure::timeout()))
            }
        }
    }

    async fn reconcile(&self, credential: &Credential) -> Result<usize, ActionError> {
        let refresh = self.collection.refresh(self.service.as_ref(), credential);
        let result = match tokio::time::timeout(self.options.request_timeout, refresh).await {
            Ok(result) => result,
            Err(_) => {
                self.collection
                    .record_error("Failed to fetch files: Request timed out");
                Err(Failure::timeout())
            }
        };

        match result {
            Ok(count) => Ok(count),
            Err(failure) if failure.is_unauthorized() => {
                self.invalidate_session();
                Err(ActionError::Unauthenticated)
            }
            Err(failure) => Err(failure.into()),
        }
    }

    fn report(&self, kind: ActionKind, key: &LockKey, result: &Result<String, ActionError>) {
        let notification = match result {
            Ok(ack) => {
                tracing::info!(action = kind.name(), %key, "{ack}");
                Notification::success("Success", kind.success_description(ack))
            }
            Err(e) => {
                tracing::warn!(action = kind.name(), %key, error = %e, "Action failed");
                Notification::error(e.to_string())
            }
        };
        self.notifier.notify(notification);
    }

    fn reject_upload(&self, message: String) -> ActionError {
        self.collection.record_error(message.clone());
        ActionError::Validation(message)
    }

    fn held(&self, id: &str) -> Result<FileRecord, ActionError> {
        self.collection
            .get(id)
            .ok_or_else(|| ActionError::Validation(format!("File {id} is not in the collection")))
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Drop the credential, the collection and every in-flight action.
    /// Returns whether a credential was held and how many actions were abandoned.
    fn teardown(&self) -> (bool, usize) {
        let had_credential = self.session.clear();
        self.collection.clear();
        let abandoned = self.locks.abandon_all();
        self.set_phase(Phase::Unauthenticated);
        (had_credential, abandoned)
    }

    /// Idempotent; any request may trigger it, including ones racing each other.
    fn invalidate_session(&self) {
        let (had_credential, abandoned) = self.teardown();
        if had_credential {
            tracing::warn!(abandoned, "Session rejected, returning to unauthenticated state");
        }
    }
}
