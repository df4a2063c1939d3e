//! Process-wide configuration, read once at startup from the environment.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::qrbill::iban::validate_qr_iban;
use crate::qrbill::reference::validate_bank_id;
use crate::qrbill::Language;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

/// The party receiving payments.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditorInfo {
    pub name: String,
    pub street: String,
    /// Postal code and city, e.g. `2501 Biel`
    pub city: String,
    pub country: String,
    /// QR-IBAN the payments are credited to
    pub iban: String,
}

/// PDF settings normally kept in the application settings store.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSettings {
    pub invoice_footer: Option<String>,
    pub quote_footer: Option<String>,
    pub watermark: bool,
    pub watermark_text: String,
    /// Marker contained in the filename of every quote
    pub quote_marker: String,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            invoice_footer: None,
            quote_footer: None,
            watermark: false,
            watermark_text: "COPY".to_string(),
            quote_marker: "quote".to_string(),
        }
    }
}

/// Where generated documents are written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoragePaths {
    pub archive_dir: PathBuf,
    pub temp_dir: PathBuf,
}

/// External tools used by the Typst rendering backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTools {
    pub typst_bin: String,
    pub qpdf_bin: String,
    /// Owner password for protected documents; defaults to the user password
    pub owner_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub creditor: CreditorInfo,
    /// Bank customer id (BESR-ID); `None` when the payee has none
    pub bank_id: Option<String>,
    pub language: Language,
    pub settings: PdfSettings,
    pub paths: StoragePaths,
    pub tools: RenderTools,
    /// Serve freshly rendered bytes even if archiving them failed
    pub serve_unpersisted_on_storage_failure: bool,
    pub bind_address: String,
    pub port: u16,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

/// Parse a boolean flag the way settings stores write them.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match optional(name) {
        None => Ok(false),
        Some(value) => parse_flag(&value).ok_or_else(|| ConfigError::Invalid {
            name,
            message: format!("'{}' is not a boolean", value),
        }),
    }
}

/// `none` selects the payee's own settlement without a bank customer id.
pub fn parse_bank_id(value: &str) -> Result<Option<String>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    validate_bank_id(trimmed).map_err(|e| ConfigError::Invalid {
        name: "QR_BANK_ID",
        message: e.to_string(),
    })?;
    Ok(Some(trimmed.to_string()))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let creditor = CreditorInfo {
            name: required("CREDITOR_NAME")?,
            street: required("CREDITOR_STREET")?,
            city: required("CREDITOR_CITY")?,
            country: or_default("CREDITOR_COUNTRY", "CH"),
            iban: required("CREDITOR_QR_IBAN")?,
        };

        validate_qr_iban("CREDITOR_QR_IBAN", &creditor.iban).map_err(|e| {
            ConfigError::Invalid {
                name: "CREDITOR_QR_IBAN",
                message: e.to_string(),
            }
        })?;

        let language = or_default("QR_LANGUAGE", "fr")
            .parse::<Language>()
            .map_err(|message| ConfigError::Invalid {
                name: "QR_LANGUAGE",
                message,
            })?;

        let defaults = PdfSettings::default();
        let settings = PdfSettings {
            invoice_footer: optional("PDF_INVOICE_FOOTER"),
            quote_footer: optional("PDF_QUOTE_FOOTER"),
            watermark: flag("PDF_WATERMARK")?,
            watermark_text: optional("PDF_WATERMARK_TEXT").unwrap_or(defaults.watermark_text),
            quote_marker: optional("QUOTE_MARKER").unwrap_or(defaults.quote_marker),
        };

        let port = or_default("PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::Invalid {
                name: "PORT",
                message: e.to_string(),
            })?;

        Ok(Self {
            creditor,
            bank_id: parse_bank_id(&or_default("QR_BANK_ID", "000000"))?,
            language,
            settings,
            paths: StoragePaths {
                archive_dir: PathBuf::from(or_default("ARCHIVE_DIR", "./uploads/archive")),
                temp_dir: PathBuf::from(or_default("TEMP_DIR", "./uploads/temp")),
            },
            tools: RenderTools {
                typst_bin: or_default("TYPST_BIN", "typst"),
                qpdf_bin: or_default("QPDF_BIN", "qpdf"),
                owner_password: optional("PDF_OWNER_PASSWORD"),
            },
            serve_unpersisted_on_storage_failure: flag("SERVE_UNPERSISTED_ON_STORAGE_FAILURE")?,
            bind_address: or_default("BIND_ADDRESS", "0.0.0.0"),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_parse_bank_id() {
        assert_eq!(parse_bank_id("000000").unwrap(), Some("000000".to_string()));
        assert_eq!(parse_bank_id(" None ").unwrap(), None);
        assert_eq!(parse_bank_id("").unwrap(), None);
    }

    #[test]
    fn test_malformed_bank_id_is_rejected() {
        for value in ["12ab", "123456789012"] {
            match parse_bank_id(value) {
                Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, "QR_BANK_ID"),
                other => panic!("expected invalid QR_BANK_ID, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_pdf_settings_defaults() {
        let settings = PdfSettings::default();
        assert!(!settings.watermark);
        assert_eq!(settings.quote_marker, "quote");
        assert!(settings.invoice_footer.is_none());
    }
}
