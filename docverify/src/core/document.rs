//! Document handles and document type classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::IntakeConfig;
use crate::errors::InvalidInputError;

/// An opaque reference to the document under verification.
///
/// The engine never reads document bytes; it only checks that the handle
/// describes something the intake policy accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// The original file name.
    pub name: String,
    /// The document size in bytes.
    pub size_bytes: u64,
    /// The media type reported by the uploader, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl DocumentHandle {
    /// Creates a new document handle.
    #[must_use]
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            media_type: None,
        }
    }

    /// Sets the media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Returns the lower-cased file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Returns the size in megabytes (MiB) for display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }

    /// Checks the handle against an intake policy.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidInputError` naming the first violated rule.
    pub fn validate(&self, intake: &IntakeConfig) -> Result<(), InvalidInputError> {
        if self.name.trim().is_empty() {
            return Err(InvalidInputError::document("file name is empty"));
        }
        if self.size_bytes == 0 {
            return Err(InvalidInputError::document(format!(
                "'{}' is empty (0 bytes)",
                self.name
            )));
        }
        if self.size_bytes > intake.max_document_bytes {
            return Err(InvalidInputError::document(format!(
                "'{}' is {} bytes, larger than the {} byte limit",
                self.name, self.size_bytes, intake.max_document_bytes
            )));
        }

        let accepted = self.extension().is_some_and(|ext| {
            intake
                .accepted_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        });
        if !accepted {
            return Err(InvalidInputError::document(format!(
                "'{}' is not one of the accepted formats ({})",
                self.name,
                intake.accepted_extensions.join(", ")
            )));
        }

        Ok(())
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2} MB)", self.name, self.size_megabytes())
    }
}

/// The classification chosen for a document before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Passport, identity card, driving licence.
    GovernmentId,
    /// Certificate of any kind.
    Certificate,
    /// Signed contract.
    Contract,
    /// Degree, transcript or diploma.
    AcademicDocument,
    /// Bank statement, invoice, tax return.
    FinancialDocument,
    /// Anything else.
    Other,
}

impl DocumentType {
    /// Every document type, in display order.
    pub const ALL: [Self; 6] = [
        Self::GovernmentId,
        Self::Certificate,
        Self::Contract,
        Self::AcademicDocument,
        Self::FinancialDocument,
        Self::Other,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::GovernmentId => "Government ID",
            Self::Certificate => "Certificate",
            Self::Contract => "Contract",
            Self::AcademicDocument => "Academic Document",
            Self::FinancialDocument => "Financial Document",
            Self::Other => "Other",
        }
    }

    /// Short key used by upload forms.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::GovernmentId => "id",
            Self::Certificate => "certificate",
            Self::Contract => "contract",
            Self::AcademicDocument => "academic",
            Self::FinancialDocument => "financial",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = InvalidInputError;

    /// Accepts either the form key (`"id"`) or the label (`"Government ID"`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidInputError::document_type("no document type selected"));
        }

        Self::ALL
            .into_iter()
            .find(|ty| {
                ty.key().eq_ignore_ascii_case(trimmed) || ty.label().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| {
                InvalidInputError::document_type(format!("unknown document type '{trimmed}'"))
            })
    }
}
