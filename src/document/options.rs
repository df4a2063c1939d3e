//! Per-document render options.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PdfSettings;

/// Kind of document being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Invoice,
    Quote,
}

impl DocumentKind {
    /// Only invoices are kept in the archive.
    pub fn is_archivable(&self) -> bool {
        matches!(self, Self::Invoice)
    }
}

/// Relationship of an embedded file to the document (PDF/A-3 `AFRelationship`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentRelationship {
    Source,
    Data,
    #[default]
    Alternative,
    Supplement,
    Unspecified,
}

impl AttachmentRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Data => "data",
            Self::Alternative => "alternative",
            Self::Supplement => "supplement",
            Self::Unspecified => "unspecified",
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A file embedded into an archival document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relationship: AttachmentRelationship,
    /// Base64 encoded content
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String, format = Byte)]
    pub data: Vec<u8>,
}

/// Electronic invoicing metadata plus the files that go with it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ComplianceEmbedding {
    /// Metadata document, embedded verbatim
    pub metadata: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Password protection: copy and print stay allowed, editing does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Protection {
    pub password: String,
    pub allow_copy: bool,
    pub allow_print: bool,
}

impl Protection {
    pub fn copy_and_print(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            allow_copy: true,
            allow_print: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub protection: Option<Protection>,
    /// Footer markup printed on every page
    pub footer: Option<String>,
    pub watermark: bool,
    pub compliance: Option<ComplianceEmbedding>,
}

/// Pick the footer for a document.
///
/// A filename carrying the quote marker gets the quote footer; any other
/// invoice gets the invoice footer. Empty settings mean no footer.
pub fn select_footer(settings: &PdfSettings, filename: &str, is_invoice: bool) -> Option<String> {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    let is_quote = !settings.quote_marker.is_empty() && filename.contains(&settings.quote_marker);
    if is_quote {
        if let Some(footer) = non_empty(&settings.quote_footer) {
            return Some(footer);
        }
    }

    if is_invoice {
        return non_empty(&settings.invoice_footer);
    }

    None
}

impl RenderOptions {
    /// Options derived from the settings store for one document.
    pub fn from_settings(settings: &PdfSettings, filename: &str, kind: DocumentKind) -> Self {
        Self {
            protection: None,
            footer: select_footer(settings, filename, kind == DocumentKind::Invoice),
            watermark: settings.watermark,
            compliance: None,
        }
    }

    /// Protect the document; an empty password leaves it unprotected.
    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.protection = password
            .filter(|p| !p.is_empty())
            .map(Protection::copy_and_print);
        self
    }

    pub fn with_compliance(mut self, compliance: Option<ComplianceEmbedding>) -> Self {
        self.compliance = compliance;
        self
    }
}
