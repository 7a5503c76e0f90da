//! Rows exchanged with the remote data service.
//!
//! Field names match the service's column names so the same types serve both
//! the REST wire format and the in-memory backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocdeskError, Result};

/// Kind of document, picked by the user at creation time.
///
/// Rows written by other clients may carry tags this crate does not know;
/// those decode as [`DocumentType::Other`] and keep their raw tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Rich-text document.
    #[default]
    Document,
    /// Tabular spreadsheet.
    Spreadsheet,
    /// Slide deck.
    Presentation,
    /// Unrecognized tag read from the service.
    #[serde(untagged)]
    Other(String),
}

impl DocumentType {
    /// Every type a new document can be created with, in the order a picker
    /// should list them.
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Document,
        DocumentType::Spreadsheet,
        DocumentType::Presentation,
    ];

    /// Wire tag for this type.
    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Document => "document",
            DocumentType::Spreadsheet => "spreadsheet",
            DocumentType::Presentation => "presentation",
            DocumentType::Other(tag) => tag,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &str {
        match self {
            DocumentType::Document => "Document",
            DocumentType::Spreadsheet => "Spreadsheet",
            DocumentType::Presentation => "Presentation",
            DocumentType::Other(tag) => tag,
        }
    }

    /// False for tags read from the service that this crate does not know.
    pub fn is_known(&self) -> bool {
        !matches!(self, DocumentType::Other(_))
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict: only the creatable types parse.
impl FromStr for DocumentType {
    type Err = DocdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "document" => Ok(DocumentType::Document),
            "spreadsheet" => Ok(DocumentType::Spreadsheet),
            "presentation" => Ok(DocumentType::Presentation),
            other => Err(DocdeskError::validation(format!(
                "unknown document type '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle tag of a document.
///
/// Statuses are changed outside this crate, so unknown tags decode as
/// [`DocumentStatus::Other`] instead of failing the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Freshly created, not yet published.
    #[default]
    Draft,
    /// Visible to readers.
    Published,
    /// Retired but kept.
    Archived,
    /// Unrecognized tag read from the service.
    #[serde(untagged)]
    Other(String),
}

impl DocumentStatus {
    /// Wire tag for this status.
    pub fn as_str(&self) -> &str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
            DocumentStatus::Archived => "archived",
            DocumentStatus::Other(tag) => tag,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document row as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Service-assigned identifier.
    pub id: String,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Body text. Not touched by the sync store.
    #[serde(default)]
    pub content: Option<String>,
    /// Attached file location. Not touched by the sync store.
    #[serde(default)]
    pub file_url: Option<String>,
    /// Owning user id.
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Kind of document.
    pub document_type: DocumentType,
    /// Lifecycle tag.
    pub status: DocumentStatus,
}

/// Insert payload for the `documents` table. The service assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Trimmed, non-empty title.
    pub title: String,
    /// Kind of document.
    pub document_type: DocumentType,
    /// Owning user id.
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Equal to `created_at` on insert.
    pub updated_at: DateTime<Utc>,
    /// Initial body, empty.
    pub content: Option<String>,
    /// Always [`DocumentStatus::Draft`] on insert.
    pub status: DocumentStatus,
}

impl NewDocument {
    /// Build a draft owned by `owner_id`, stamped with `now`.
    ///
    /// Surrounding whitespace is stripped from `title`; a title that is empty
    /// afterwards is rejected, as is a [`DocumentType::Other`] tag.
    pub fn draft(
        title: &str,
        document_type: DocumentType,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let title = normalize_title(title)?;
        if !document_type.is_known() {
            return Err(DocdeskError::validation(format!(
                "unknown document type '{}'",
                document_type
            )));
        }
        Ok(Self {
            title,
            document_type,
            created_by: owner_id.to_string(),
            created_at: now,
            updated_at: now,
            content: Some(String::new()),
            status: DocumentStatus::Draft,
        })
    }

    /// Materialize the row the service would return for this payload.
    pub fn into_document(self, id: String) -> Document {
        Document {
            id,
            title: self.title,
            content: self.content,
            file_url: None,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            document_type: self.document_type,
            status: self.status,
        }
    }
}

/// Trim a user-supplied title, rejecting blanks.
pub fn normalize_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DocdeskError::validation("document title must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// The identity returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Stable user id; matches `Document::created_by`.
    pub id: String,
    /// Email address, when the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
}

/// Options forwarded to the provider on sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpOptions {
    /// Where the verification email should send the user.
    pub email_redirect_to: Option<String>,
    /// Display name stored in the provider's user metadata.
    pub full_name: Option<String>,
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Same id as the auth user.
    pub id: String,
    /// Contact email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Avatar image location.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Most recent sign-in.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Payload written on every sign-in, merged on `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpsert {
    /// Conflict key.
    pub id: String,
    /// Contact email.
    pub email: String,
    /// Sign-in time.
    pub last_login: DateTime<Utc>,
}

/// Payload written once on sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserProfile {
    /// Same id as the auth user.
    pub id: String,
    /// Contact email.
    pub email: String,
    /// Display name derived at sign-up.
    pub full_name: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Set to the sign-up time.
    pub last_login: Option<DateTime<Utc>>,
}

/// Default display name for a new account: the local part of the email.
pub fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn draft_trims_title_and_stamps_both_timestamps() {
        let doc = NewDocument::draft("  Report Q1  ", DocumentType::Document, "u1", fixed_now())
            .unwrap();
        assert_eq!(doc.title, "Report Q1");
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.content.as_deref(), Some(""));
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.created_by, "u1");
    }

    #[test]
    fn draft_rejects_blank_title() {
        let err = NewDocument::draft(" \t\n", DocumentType::Document, "u1", fixed_now())
            .unwrap_err();
        assert!(matches!(err, DocdeskError::Validation(_)));
    }

    #[test]
    fn document_type_parses_known_tags_only() {
        assert_eq!(
            "spreadsheet".parse::<DocumentType>().unwrap(),
            DocumentType::Spreadsheet
        );
        assert!(matches!(
            "pdf".parse::<DocumentType>(),
            Err(DocdeskError::Validation(_))
        ));
    }

    #[test]
    fn document_deserializes_from_service_row() {
        let row = serde_json::json!({
            "id": "d-1",
            "title": "Budget",
            "content": null,
            "file_url": null,
            "created_by": "u1",
            "created_at": "2024-03-01T09:30:00Z",
            "updated_at": "2024-03-01T09:30:00Z",
            "document_type": "spreadsheet",
            "status": "published"
        });
        let doc: Document = serde_json::from_value(row).unwrap();
        assert_eq!(doc.document_type, DocumentType::Spreadsheet);
        assert_eq!(doc.status, DocumentStatus::Published);
        assert_eq!(doc.created_at, fixed_now());
        assert!(doc.content.is_none());
    }

    #[test]
    fn draft_rejects_unknown_type() {
        let err = NewDocument::draft(
            "Scan",
            DocumentType::Other("pdf".to_string()),
            "u1",
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, DocdeskError::Validation(_)));
    }

    #[test]
    fn creatable_types_round_trip_through_tag_and_json() {
        for ty in DocumentType::ALL {
            assert!(ty.is_known());
            assert_eq!(ty.as_str().parse::<DocumentType>().unwrap(), ty);
            assert_eq!(serde_json::to_value(&ty).unwrap(), ty.as_str());
            assert!(ty.label().starts_with(|c: char| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn unknown_tags_decode_without_failing_the_list() {
        let rows = serde_json::json!([
            {
                "id": "d-1",
                "title": "Budget",
                "created_by": "u1",
                "created_at": "2024-03-01T09:30:00Z",
                "updated_at": "2024-03-01T09:30:00Z",
                "document_type": "spreadsheet",
                "status": "published"
            },
            {
                "id": "d-2",
                "title": "Contract",
                "created_by": "u1",
                "created_at": "2024-03-01T09:30:00Z",
                "updated_at": "2024-03-01T09:30:00Z",
                "document_type": "pdf",
                "status": "in_review"
            }
        ]);
        let docs: Vec<Document> = serde_json::from_value(rows).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].status, DocumentStatus::Other("in_review".to_string()));
        assert_eq!(docs[1].document_type, DocumentType::Other("pdf".to_string()));
        assert_eq!(docs[1].status.to_string(), "in_review");

        // The raw tag is written back unchanged.
        let back = serde_json::to_value(&docs[1]).unwrap();
        assert_eq!(back["status"], "in_review");
        assert_eq!(back["document_type"], "pdf");
        assert!("pdf".parse::<DocumentType>().is_err());
    }

    #[test]
    fn display_name_uses_local_part() {
        assert_eq!(display_name_from_email("ada@example.com"), "ada");
        assert_eq!(display_name_from_email("no-at-sign"), "no-at-sign");
    }
}
