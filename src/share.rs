//! Share link resolution and clipboard export.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::models::FileRecord;
use crate::transport::SHARE_PATH;

/// Public URL for a record, recomputed from the record every time.
/// `None` unless the record is public and carries a share id.
pub fn resolve_share_url(base_url: &str, record: &FileRecord) -> Option<String> {
    let share_id = record.share_id()?;
    Some(format!(
        "{}{SHARE_PATH}/{share_id}",
        base_url.trim_end_matches('/')
    ))
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Clipboard command failed: {0}")]
    Command(String),
    #[error("No clipboard command available")]
    Unavailable,
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard backed by a system command that reads the text from stdin
/// (`pbcopy`, `wl-copy`, `xclip -selection clipboard`, ...).
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    /// Parse a whitespace-separated command line.
    pub fn new(command: &str) -> Result<Self, ClipboardError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ClipboardError::Unavailable)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// The configured command, or a platform default.
    pub fn from_config(command: Option<&str>) -> Result<Self, ClipboardError> {
        match command {
            Some(command) => Self::new(command),
            None => Self::new(platform_default()),
        }
    }
}

fn platform_default() -> &'static str {
    if cfg!(target_os = "macos") {
        "pbcopy"
    } else if cfg!(target_os = "windows") {
        "clip"
    } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        "wl-copy"
    } else {
        "xclip -selection clipboard"
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipboardError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
