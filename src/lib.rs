//! fileshare-client - Client-side file collection manager for a remote file service
//!
//! This crate keeps a local view of a user's uploaded files in sync with the server:
//! - Bearer-token session context with redb-backed persistence
//! - Swappable transports (HTTP via reqwest, in-memory for development and tests)
//! - Per-record action locks with timeouts and cancellation
//! - Full refetch after every mutation, never optimistic patching
//! - Share link resolution for public files

pub mod collection;
pub mod config;
pub mod dashboard;
pub mod locks;
pub mod models;
pub mod notify;
pub mod session;
pub mod share;
pub mod state_machine;
pub mod storage;
pub mod transport;
#[cfg(test)]
pub mod testutil;

pub use dashboard::{ActionError, Dashboard, DashboardView, FileView, Phase};
pub use models::{FileRecord, Privacy};
pub use session::{Credential, Session};
