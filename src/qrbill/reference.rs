//! QR payment reference generation.
//!
//! A QR reference is 27 digits: the bank-assigned customer id (BESR-ID),
//! the internal document number left-padded with zeros to fill 26 digits,
//! and one check digit computed with the recursive modulo-10 algorithm.

use serde::Serialize;
use std::fmt;

use super::validation::{is_digits, ValidationError};

/// Total length of a QR reference including the check digit.
pub const REFERENCE_LENGTH: usize = 27;

/// Digits available before the check digit.
const BODY_LENGTH: usize = REFERENCE_LENGTH - 1;

/// Longest customer id a bank hands out.
pub const MAX_BANK_ID_LENGTH: usize = 11;

const MODULO10_TABLE: [u8; 10] = [0, 9, 4, 6, 8, 2, 7, 1, 3, 5];

/// A checksum-validated 27 digit payment reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Parse an existing reference, verifying length and check digit.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();

        if compact.len() != REFERENCE_LENGTH || !is_digits(&compact) {
            return Err(ValidationError::new(
                "reference",
                format!("A QR reference has exactly {} digits", REFERENCE_LENGTH),
            ));
        }

        if recursive_modulo10(&compact) != 0 {
            return Err(ValidationError::new("reference", "Check digit does not match"));
        }

        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[BODY_LENGTH] - b'0'
    }

    /// Print form: a block of two digits, then blocks of five.
    pub fn formatted(&self) -> String {
        let (head, tail) = self.0.split_at(2);
        let mut out = String::from(head);
        for chunk in tail.as_bytes().chunks(5) {
            out.push(' ');
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        }
        out
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run the recursive modulo-10 transform over `digits` and return the
/// final carry. Non-digit characters must be filtered out by the caller.
pub fn recursive_modulo10(digits: &str) -> u8 {
    digits.bytes().fold(0u8, |carry, b| {
        let digit = b - b'0';
        MODULO10_TABLE[((carry + digit) % 10) as usize]
    })
}

/// Check digit that brings the carry of `digits` back to zero.
pub fn check_digit(digits: &str) -> u8 {
    (10 - recursive_modulo10(digits)) % 10
}

/// A bank customer id is all digits and at most eleven of them.
pub fn validate_bank_id(bank_id: &str) -> Result<(), ValidationError> {
    if !is_digits(bank_id) {
        return Err(ValidationError::not_numeric("bank_id", "Bank customer id"));
    }
    if bank_id.len() > MAX_BANK_ID_LENGTH {
        return Err(ValidationError::new(
            "bank_id",
            format!(
                "Bank customer id is limited to {} digits",
                MAX_BANK_ID_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Generate the payment reference for a document.
///
/// `bank_id` is the customer id handed out by the bank; `None` is used when
/// the payee settles directly without an institution id. `document_number`
/// must be a positive integer that fits in the digits left over.
pub fn generate(
    bank_id: Option<&str>,
    document_number: &str,
) -> Result<PaymentReference, ValidationError> {
    let bank_id = bank_id.map(str::trim).unwrap_or("");
    if !bank_id.is_empty() {
        validate_bank_id(bank_id)?;
    }

    let number = document_number.trim();
    if !is_digits(number) {
        return Err(ValidationError::not_numeric("document_id", "Document number"));
    }

    let significant = number.trim_start_matches('0');
    if significant.is_empty() {
        return Err(ValidationError::new(
            "document_id",
            "Document number must be a positive integer",
        ));
    }

    let budget = BODY_LENGTH - bank_id.len();
    if significant.len() > budget {
        return Err(ValidationError::new(
            "document_id",
            format!(
                "Document number exceeds the {} digits left after the bank customer id",
                budget
            ),
        ));
    }

    let mut reference = String::with_capacity(REFERENCE_LENGTH);
    reference.push_str(bank_id);
    reference.push_str(&format!("{:0>width$}", significant, width = budget));

    let check = check_digit(&reference);
    reference.push(char::from(b'0' + check));

    log::debug!("generated payment reference {}", reference);
    Ok(PaymentReference(reference))
}
