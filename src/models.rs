use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access state of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Private,
    Public,
}

impl Privacy {
    pub fn from_public(is_public: bool) -> Self {
        if is_public {
            Privacy::Public
        } else {
            Privacy::Private
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Privacy::Private => Privacy::Public,
            Privacy::Public => Privacy::Private,
        }
    }
}

impl std::fmt::Display for Privacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Privacy::Private => f.write_str("private"),
            Privacy::Public => f.write_str("public"),
        }
    }
}

impl std::str::FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Privacy::Public),
            "private" => Ok(Privacy::Private),
            other => Err(format!("unknown privacy '{other}', expected public or private")),
        }
    }
}

/// Classification of a file derived from its MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Binary,
    Document,
    Image,
    Video,
}

impl FileType {
    /// Derive a file type classification from a MIME type string.
    pub fn from_mime(mime_type: &str) -> Self {
        let mut parts = mime_type.splitn(2, '/');
        let primary = parts.next().unwrap_or("");
        let sub = parts.next().unwrap_or("");
        match primary {
            "audio" => FileType::Audio,
            "image" => FileType::Image,
            "video" => FileType::Video,
            "text" => FileType::Document,
            "application" => match sub {
                "pdf"
                | "msword"
                | "rtf"
                | "vnd.openxmlformats-officedocument.wordprocessingml.document"
                | "vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "vnd.openxmlformats-officedocument.presentationml.presentation"
                | "vnd.ms-excel"
                | "vnd.ms-powerpoint" => FileType::Document,
                _ => FileType::Binary,
            },
            _ => FileType::Binary,
        }
    }

    /// Guess from a filename's extension, falling back to `Binary`.
    pub fn from_filename(filename: &str) -> Self {
        mime_guess::from_path(filename)
            .first()
            .map(|m| Self::from_mime(m.essence_str()))
            .unwrap_or(FileType::Binary)
    }
}

/// One uploaded file as known to the client.
///
/// Field names follow the file service's JSON (`_id`, `fileURl`, camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub filename: String,
    #[serde(rename = "fileURl", alias = "fileUrl")]
    pub file_url: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn privacy(&self) -> Privacy {
        Privacy::from_public(self.is_public)
    }

    /// Share identifier, only while the record is public.
    pub fn share_id(&self) -> Option<&str> {
        if self.is_public {
            self.share_id.as_deref().filter(|s| !s.is_empty())
        } else {
            None
        }
    }

    /// `shareId` is present exactly when the record is public.
    pub fn is_consistent(&self) -> bool {
        let has_share = self.share_id.as_deref().is_some_and(|s| !s.is_empty());
        has_share == self.is_public
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_filename(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_record() {
        let json = r#"{
            "_id": "66a1",
            "filename": "report.pdf",
            "fileURl": "https://cdn.example.com/report.pdf",
            "isPublic": true,
            "shareId": "abc123",
            "createdAt": "2024-05-01T10:00:00.000Z"
        }"#;

        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "66a1");
        assert_eq!(record.file_url, "https://cdn.example.com/report.pdf");
        assert!(record.is_public);
        assert_eq!(record.share_id(), Some("abc123"));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_deserialize_accepts_plain_field_names() {
        let json = r#"{
            "id": "66a2",
            "filename": "notes.txt",
            "fileUrl": "https://cdn.example.com/notes.txt",
            "isPublic": false,
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;

        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "66a2");
        assert_eq!(record.share_id, None);
        assert_eq!(record.privacy(), Privacy::Private);
    }

    #[test]
    fn test_private_record_never_exposes_share_id() {
        let record = FileRecord {
            id: "x".to_string(),
            filename: "a.png".to_string(),
            file_url: "u".to_string(),
            is_public: false,
            share_id: Some("leftover".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(record.share_id(), None);
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_file_type_from_mime() {
        assert_eq!(FileType::from_mime("image/png"), FileType::Image);
        assert_eq!(FileType::from_mime("video/mp4"), FileType::Video);
        assert_eq!(FileType::from_mime("audio/mpeg"), FileType::Audio);
        assert_eq!(FileType::from_mime("application/pdf"), FileType::Document);
        assert_eq!(FileType::from_mime("text/plain"), FileType::Document);
        assert_eq!(
            FileType::from_mime("application/octet-stream"),
            FileType::Binary
        );
        assert_eq!(FileType::from_mime("unknown/type"), FileType::Binary);
    }

    #[test]
    fn test_file_type_from_filename() {
        assert_eq!(FileType::from_filename("report.pdf"), FileType::Document);
        assert_eq!(FileType::from_filename("photo.JPG"), FileType::Image);
        assert_eq!(FileType::from_filename("no-extension"), FileType::Binary);
    }

    #[test]
    fn test_privacy_parse_and_toggle() {
        assert_eq!("Public".parse::<Privacy>(), Ok(Privacy::Public));
        assert_eq!("private".parse::<Privacy>(), Ok(Privacy::Private));
        assert!("shared".parse::<Privacy>().is_err());
        assert_eq!(Privacy::Public.toggled(), Privacy::Private);
    }
}
