//! Shared test helpers for dashboard tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::dashboard::{Dashboard, DashboardOptions};
use crate::models::FileRecord;
use crate::notify::{Notification, NotificationSink};
use crate::session::{Credential, Session};
use crate::share::{Clipboard, ClipboardError};
use crate::transport::InMemoryFileService;

pub const TEST_BASE: &str = "https://files.test";
pub const TEST_TOKEN: &str = "test-token";

/// Keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.notifications.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    contents: Mutex<Option<String>>,
    fail: AtomicBool,
}

impl FakeClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clipboard for FakeClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClipboardError::Command("clipboard locked".to_string()));
        }
        *self.contents.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub dashboard: Dashboard,
    pub service: Arc<InMemoryFileService>,
    pub sink: Arc<RecordingSink>,
    pub clipboard: Arc<FakeClipboard>,
}

pub fn test_options() -> DashboardOptions {
    DashboardOptions {
        share_base: TEST_BASE.to_string(),
        request_timeout: Duration::from_secs(5),
        max_upload_size: 1024,
    }
}

/// Dashboard over an in-memory service that accepts `TEST_TOKEN`.
pub fn harness() -> Harness {
    harness_with_session(Session::in_memory(Some(Credential::new(TEST_TOKEN))))
}

pub fn harness_with_session(session: Session) -> Harness {
    let service = Arc::new(InMemoryFileService::new(TEST_BASE));
    service.authorize(TEST_TOKEN);
    let sink = Arc::new(RecordingSink::default());
    let clipboard = Arc::new(FakeClipboard::default());

    let dashboard = Dashboard::new(
        test_options(),
        service.clone(),
        Arc::new(session),
        sink.clone(),
        clipboard.clone(),
    );

    Harness {
        dashboard,
        service,
        sink,
        clipboard,
    }
}

impl Harness {
    /// Upload through the dashboard and return the resulting record.
    pub async fn upload(&self, filename: &str) -> FileRecord {
        self.dashboard
            .upload(filename, Bytes::from(format!("contents of {filename}")))
            .await
            .expect("upload should succeed");
        self.dashboard
            .files()
            .into_iter()
            .find(|f| f.filename == filename)
            .expect("uploaded file should be listed")
    }
}
