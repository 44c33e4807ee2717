mod http;
mod memory;

pub use http::HttpFileService;
pub use memory::{InMemoryFileService, Operation};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::FileRecord;
use crate::session::Credential;

/// Path prefix shared by every file service route
pub const API_PREFIX: &str = "/api/files";

/// Path segment under which public share links resolve
pub const SHARE_PATH: &str = "/api/files/share";

/// Why a remote call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStatus {
    /// The service answered with a non-success status code.
    Http(u16),
    /// No response was received.
    Network,
    /// The action exceeded its time budget.
    Timeout,
    /// The action was cancelled before it settled.
    Cancelled,
}

impl std::fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStatus::Http(code) => write!(f, "{code}"),
            FailureStatus::Network => f.write_str("network"),
            FailureStatus::Timeout => f.write_str("timeout"),
            FailureStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Failed outcome of a remote call. Transports never panic or leak their own
/// error types past this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({status})")]
pub struct Failure {
    pub status: FailureStatus,
    pub message: String,
}

impl Failure {
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::Http(code),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::Network,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: FailureStatus::Timeout,
            message: "Request timed out".to_string(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: FailureStatus::Cancelled,
            message: "Request cancelled".to_string(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::http(401, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == FailureStatus::Http(401)
    }
}

/// Uniform result of every remote call.
pub type Outcome<T> = Result<T, Failure>;

/// The remote operations of the file service.
///
/// `toggle_privacy` flips the server-side state; it carries no target, so two
/// calls in a row return the file to where it started.
#[async_trait]
pub trait FileService: Send + Sync {
    async fn list_files(&self, credential: &Credential) -> Outcome<Vec<FileRecord>>;
    /// Store a new file. The new record is not returned; callers refresh.
    async fn upload_file(
        &self,
        credential: &Credential,
        data: Bytes,
        filename: &str,
    ) -> Outcome<String>;
    async fn toggle_privacy(&self, credential: &Credential, id: &str) -> Outcome<String>;
    async fn delete_file(&self, credential: &Credential, id: &str) -> Outcome<String>;
    /// Unauthenticated fetch through a public share identifier.
    async fn fetch_shared(&self, share_id: &str) -> Outcome<Bytes>;
}
