use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{Failure, FileService, Outcome, API_PREFIX, SHARE_PATH};
use crate::models::FileRecord;
use crate::session::Credential;

/// File service reached over HTTP with bearer authentication.
pub struct HttpFileService {
    base_url: String,
    client: Client,
}

/// `{message}` body used by the service for acks and rejections
#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: String,
}

impl HttpFileService {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn files_url(&self) -> String {
        format!("{}{API_PREFIX}/files", self.base_url)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}{API_PREFIX}/files/{id}", self.base_url)
    }

    fn toggle_url(&self, id: &str) -> String {
        format!("{}{API_PREFIX}/files/{id}/toggle-privacy", self.base_url)
    }

    fn upload_url(&self) -> String {
        format!("{}{API_PREFIX}/upload", self.base_url)
    }

    fn share_url(&self, share_id: &str) -> String {
        format!("{}{SHARE_PATH}/{share_id}", self.base_url)
    }
}

#[async_trait]
impl FileService for HttpFileService {
    async fn list_files(&self, credential: &Credential) -> Outcome<Vec<FileRecord>> {
        let resp = self
            .client
            .get(self.files_url())
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(rejection(resp, "Failed to fetch files").await);
        }

        resp.json::<Vec<FileRecord>>()
            .await
            .map_err(|e| Failure::network(format!("Malformed file listing: {e}")))
    }

    async fn upload_file(
        &self,
        credential: &Credential,
        data: Bytes,
        filename: &str,
    ) -> Outcome<String> {
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(&mime_type)
            .map_err(|e| Failure::network(format!("Invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.upload_url())
            .bearer_auth(credential.token())
            .multipart(form)
            .send()
            .await
            .map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(rejection(resp, "Upload failed").await);
        }

        Ok(ack_message(resp, "File uploaded successfully!").await)
    }

    async fn toggle_privacy(&self, credential: &Credential, id: &str) -> Outcome<String> {
        let resp = self
            .client
            .patch(self.toggle_url(id))
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(rejection(resp, "Failed to update file privacy").await);
        }

        Ok(ack_message(resp, "File privacy updated").await)
    }

    async fn delete_file(&self, credential: &Credential, id: &str) -> Outcome<String> {
        let resp = self
            .client
            .delete(self.file_url(id))
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(rejection(resp, "Failed to delete file").await);
        }

        Ok(ack_message(resp, "File deleted successfully").await)
    }

    async fn fetch_shared(&self, share_id: &str) -> Outcome<Bytes> {
        // Share links resolve without a credential
        let resp = self
            .client
            .get(self.share_url(share_id))
            .send()
            .await
            .map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(rejection(resp, "Shared file not available").await);
        }

        resp.bytes().await.map_err(transport_failure)
    }
}

fn transport_failure(e: reqwest::Error) -> Failure {
    if e.is_timeout() {
        Failure::timeout()
    } else {
        Failure::network(e.to_string())
    }
}

/// Build a failure from a non-success response, preferring the service's own message.
async fn rejection(resp: Response, fallback: &str) -> Failure {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("{fallback}: {status}"));

    Failure::http(status, message)
}

async fn ack_message(resp: Response, fallback: &str) -> String {
    resp.json::<MessageBody>()
        .await
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_construction() {
        let service =
            HttpFileService::new("https://files.example.com/", Duration::from_secs(1)).unwrap();

        assert_eq!(service.base_url(), "https://files.example.com");
        assert_eq!(
            service.files_url(),
            "https://files.example.com/api/files/files"
        );
        assert_eq!(
            service.toggle_url("abc"),
            "https://files.example.com/api/files/files/abc/toggle-privacy"
        );
        assert_eq!(
            service.file_url("abc"),
            "https://files.example.com/api/files/files/abc"
        );
        assert_eq!(
            service.upload_url(),
            "https://files.example.com/api/files/upload"
        );
        assert_eq!(
            service.share_url("s1"),
            "https://files.example.com/api/files/share/s1"
        );
    }
}
