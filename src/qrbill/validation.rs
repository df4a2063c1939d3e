//! Input validation for payment slip data.
//!
//! Every failure names the offending field so the caller can tell the user
//! exactly which value to fix.

use std::fmt;

/// Validation error with a field path and a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The field that failed validation, e.g. `debtor.postal_code`
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} must not be empty", label))
            .with_suggestion(format!("Provide a value for {}", label.to_lowercase()))
    }

    /// Create error for a value that must consist of digits only
    pub fn not_numeric(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} must contain digits only", label))
    }

    pub fn invalid_amount(field: &str, message: impl Into<String>) -> Self {
        Self::new(field, message)
            .with_suggestion("Use a positive amount with at most two decimals, e.g. 1250.50")
    }

    pub fn unsupported_currency(field: &str, value: &str) -> Self {
        Self::new(field, format!("Currency '{}' is not allowed on a QR-bill", value))
            .with_suggestion("Use CHF or EUR")
    }

    pub fn not_qr_iban(field: &str, message: impl Into<String>) -> Self {
        Self::new(field, message).with_suggestion(
            "Use the QR-IBAN issued by the bank (institution id 30000-31999), not the classic IBAN",
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Whether any error was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Get formatted error message listing every offending field
    pub fn to_message(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Validation failed: {} error(s) found",
            self.errors.len()
        )];

        for (i, error) in self.errors.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, error));
        }

        parts.join("\n")
    }

    /// Ok if no errors were collected, the collection itself otherwise
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_message())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

/// Validate a two-letter ISO 3166 country code
pub fn validate_country(value: &str, field: &str, errors: &mut ValidationErrors) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field(field, "Country"));
        return;
    }

    if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.add(
            ValidationError::new(field, format!("Country '{}' is not a two-letter code", trimmed))
                .with_suggestion("Use an ISO 3166-1 alpha-2 code, e.g. CH"),
        );
    }
}

/// Check that `value` is a non-empty run of ASCII digits
pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}
