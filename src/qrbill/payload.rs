//! Swiss QR-bill payload encoding (Swiss Payments Code, version 2.0).
//!
//! The payload is a fixed sequence of newline-separated fields. Absent
//! optional values keep their slot as an empty line so the field count
//! never changes.

use rust_decimal::Decimal;
use serde::Serialize;

use super::iban::validate_qr_iban;
use super::model::{Currency, InvoicePaymentData};
use super::reference::PaymentReference;
use super::validation::{validate_country, validate_required, ValidationError, ValidationErrors};
use crate::config::CreditorInfo;

pub const QR_TYPE: &str = "SPC";
pub const VERSION: &str = "0200";
pub const CODING_TYPE: &str = "1";
pub const REFERENCE_TYPE_QR: &str = "QRR";
pub const TRAILER: &str = "EPD";

/// Header (3) + account (1) + creditor (7) + ultimate creditor (7)
/// + amount/currency (2) + ultimate debtor (7) + reference (2)
/// + message/trailer (2).
pub const PAYLOAD_FIELD_COUNT: usize = 31;

const ADDRESS_FIELD_COUNT: usize = 7;

const MAX_NAME: usize = 70;
const MAX_STREET: usize = 70;
const MAX_BUILDING_NUMBER: usize = 16;
const MAX_POSTAL_CODE: usize = 16;
const MAX_TOWN: usize = 35;
const MAX_ADDRESS_LINE: usize = 70;
const MAX_MESSAGE: usize = 140;

/// Largest amount the standard accepts.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999, 2)
}

/// Address style of a payload address block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressKind {
    /// Street, building number, postal code and town in separate fields
    Structured,
    /// Two free address lines
    Combined,
}

impl AddressKind {
    fn code(&self) -> &'static str {
        match self {
            Self::Structured => "S",
            Self::Combined => "K",
        }
    }
}

/// One address block, already truncated to the field limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub kind: AddressKind,
    pub name: String,
    pub line_1: String,
    pub line_2: String,
    pub postal_code: String,
    pub town: String,
    pub country: String,
}

impl Address {
    fn qr_fields(&self) -> [String; ADDRESS_FIELD_COUNT] {
        [
            self.kind.code().to_string(),
            self.name.clone(),
            self.line_1.clone(),
            self.line_2.clone(),
            self.postal_code.clone(),
            self.town.clone(),
            self.country.clone(),
        ]
    }

    /// Lines printed in the human-readable part of the slip.
    pub fn display_lines(&self) -> Vec<String> {
        let lines = match self.kind {
            AddressKind::Structured => vec![
                self.name.clone(),
                format!("{} {}", self.line_1, self.line_2).trim().to_string(),
                format!("{} {}", self.postal_code, self.town).trim().to_string(),
            ],
            AddressKind::Combined => {
                vec![self.name.clone(), self.line_1.clone(), self.line_2.clone()]
            }
        };
        lines.into_iter().filter(|l| !l.is_empty()).collect()
    }
}

/// A field that had to be shortened to fit the standard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruncationWarning {
    pub field: String,
    pub original_length: usize,
    pub max_length: usize,
}

/// Validated and encoded payment slip payload.
#[derive(Debug, Clone, Serialize)]
pub struct SlipPayload {
    fields: Vec<String>,
    pub iban: String,
    pub creditor: Address,
    pub debtor: Address,
    /// Amount with exactly two decimals, e.g. `1250.50`
    pub amount: String,
    pub currency: Currency,
    pub reference: PaymentReference,
    /// Unstructured message shown as additional information
    pub message: String,
    pub warnings: Vec<TruncationWarning>,
}

impl SlipPayload {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Text encoded into the QR code.
    pub fn to_qr_string(&self) -> String {
        self.fields.join("\n")
    }

    /// Amount grouped by thousands with a space, as printed on the slip.
    pub fn display_amount(&self) -> String {
        let (units, cents) = self.amount.split_once('.').unwrap_or((&self.amount, "00"));
        let mut grouped = String::new();
        for (i, c) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(' ');
            }
            grouped.push(c);
        }
        format!("{}.{}", grouped, cents)
    }
}

/// Replace line breaks and other control characters with spaces; the
/// payload is line separated.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Truncate `value` to `max` characters, recording a warning when needed.
fn fit(value: &str, max: usize, field: &str, warnings: &mut Vec<TruncationWarning>) -> String {
    let value = single_line(value);
    let value = value.trim();
    let length = value.chars().count();
    if length <= max {
        return value.to_string();
    }

    log::warn!(
        "truncating payload field '{}' from {} to {} characters",
        field,
        length,
        max
    );
    warnings.push(TruncationWarning {
        field: field.to_string(),
        original_length: length,
        max_length: max,
    });
    value.chars().take(max).collect()
}

fn validate_amount(total: Decimal, errors: &mut ValidationErrors) -> Option<String> {
    if total.is_sign_negative() || total.is_zero() {
        errors.add(ValidationError::invalid_amount(
            "total",
            format!("Amount {} must be positive", total),
        ));
        return None;
    }

    if total.round_dp(2) != total {
        errors.add(ValidationError::invalid_amount(
            "total",
            format!("Amount {} has more than two decimals", total),
        ));
        return None;
    }

    if total > max_amount() {
        errors.add(ValidationError::invalid_amount(
            "total",
            format!("Amount {} exceeds the maximum of {}", total, max_amount()),
        ));
        return None;
    }

    let mut amount = total;
    amount.rescale(2);
    Some(amount.to_string())
}

/// Builds slip payloads for one creditor.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    creditor: CreditorInfo,
}

impl PayloadEncoder {
    pub fn new(creditor: CreditorInfo) -> Self {
        Self { creditor }
    }

    pub fn creditor(&self) -> &CreditorInfo {
        &self.creditor
    }

    /// Validate the inputs and assemble the payload.
    ///
    /// Amount, currency, account and debtor failures are collected and
    /// returned together. Over-long text fields are truncated and reported
    /// in [`SlipPayload::warnings`].
    pub fn encode(
        &self,
        debtor: &InvoicePaymentData,
        reference: &PaymentReference,
    ) -> Result<SlipPayload, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut warnings = Vec::new();

        let amount = validate_amount(debtor.total, &mut errors);

        let currency = match debtor.currency.parse::<Currency>() {
            Ok(currency) => Some(currency),
            Err(code) => {
                errors.add(ValidationError::unsupported_currency("currency", &code));
                None
            }
        };

        let iban = match validate_qr_iban("creditor.iban", &self.creditor.iban) {
            Ok(iban) => Some(iban),
            Err(e) => {
                errors.add(e);
                None
            }
        };

        validate_required(&self.creditor.name, "creditor.name", "Creditor name", &mut errors);
        validate_required(&self.creditor.city, "creditor.city", "Creditor postal code and city", &mut errors);
        validate_country(&self.creditor.country, "creditor.country", &mut errors);

        let debtor_name = debtor.debtor_name();
        validate_required(&debtor_name, "debtor.name", "Debtor name", &mut errors);
        validate_required(&debtor.address_1, "debtor.address_1", "Debtor street", &mut errors);
        validate_required(&debtor.postal_code, "debtor.postal_code", "Debtor postal code", &mut errors);
        validate_required(&debtor.city, "debtor.city", "Debtor city", &mut errors);
        validate_country(&debtor.country, "debtor.country", &mut errors);

        errors.into_result()?;
        let (Some(amount), Some(currency), Some(iban)) = (amount, currency, iban) else {
            return Err(ValidationError::new("payment", "Incomplete payment data").into());
        };

        let creditor = Address {
            kind: AddressKind::Combined,
            name: fit(&self.creditor.name, MAX_NAME, "creditor.name", &mut warnings),
            line_1: fit(&self.creditor.street, MAX_ADDRESS_LINE, "creditor.street", &mut warnings),
            line_2: fit(&self.creditor.city, MAX_ADDRESS_LINE, "creditor.city", &mut warnings),
            postal_code: String::new(),
            town: String::new(),
            country: self.creditor.country.trim().to_ascii_uppercase(),
        };

        let debtor_address = Address {
            kind: AddressKind::Structured,
            name: fit(&debtor_name, MAX_NAME, "debtor.name", &mut warnings),
            line_1: fit(&debtor.address_1, MAX_STREET, "debtor.address_1", &mut warnings),
            line_2: fit(&debtor.address_2, MAX_BUILDING_NUMBER, "debtor.address_2", &mut warnings),
            postal_code: fit(&debtor.postal_code, MAX_POSTAL_CODE, "debtor.postal_code", &mut warnings),
            town: fit(&debtor.city, MAX_TOWN, "debtor.city", &mut warnings),
            country: debtor.country.trim().to_ascii_uppercase(),
        };

        let message = fit(&debtor.document_number, MAX_MESSAGE, "document_number", &mut warnings);

        let mut fields = Vec::with_capacity(PAYLOAD_FIELD_COUNT);
        fields.push(QR_TYPE.to_string());
        fields.push(VERSION.to_string());
        fields.push(CODING_TYPE.to_string());
        fields.push(iban.clone());
        fields.extend(creditor.qr_fields());
        // ultimate creditor, reserved for future use
        fields.extend(std::iter::repeat(String::new()).take(ADDRESS_FIELD_COUNT));
        fields.push(amount.clone());
        fields.push(currency.code().to_string());
        fields.extend(debtor_address.qr_fields());
        fields.push(REFERENCE_TYPE_QR.to_string());
        fields.push(reference.as_str().to_string());
        fields.push(message.clone());
        fields.push(TRAILER.to_string());

        debug_assert_eq!(fields.len(), PAYLOAD_FIELD_COUNT);

        Ok(SlipPayload {
            fields,
            iban,
            creditor,
            debtor: debtor_address,
            amount,
            currency,
            reference: reference.clone(),
            message,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrbill::reference::generate;
    use std::str::FromStr;

    fn creditor() -> CreditorInfo {
        CreditorInfo {
            name: "Robert Schneider AG".to_string(),
            street: "Rue du Lac 1268".to_string(),
            city: "2501 Biel".to_string(),
            country: "CH".to_string(),
            iban: "CH44 3199 9123 0008 8901 2".to_string(),
        }
    }

    fn invoice() -> InvoicePaymentData {
        InvoicePaymentData {
            document_id: 42,
            document_number: "INV-2024-042".to_string(),
            client_name: "Pia-Maria".to_string(),
            client_surname: "Rutschmann-Schnyder".to_string(),
            address_1: "Grosse Marktgasse".to_string(),
            address_2: "28".to_string(),
            postal_code: "9400".to_string(),
            city: "Rorschach".to_string(),
            country: "CH".to_string(),
            total: Decimal::from_str("1949.75").unwrap(),
            currency: "CHF".to_string(),
        }
    }

    fn reference() -> PaymentReference {
        generate(Some("000000"), "42").unwrap()
    }

    #[test]
    fn test_encode_field_order() {
        let payload = PayloadEncoder::new(creditor()).encode(&invoice(), &reference()).unwrap();
        let fields = payload.fields();

        assert_eq!(payload.field_count(), PAYLOAD_FIELD_COUNT);
        assert_eq!(&fields[..4], ["SPC", "0200", "1", "CH4431999123000889012"]);
        assert_eq!(&fields[4..11], ["K", "Robert Schneider AG", "Rue du Lac 1268", "2501 Biel", "", "", "CH"]);
        assert!(fields[11..18].iter().all(String::is_empty));
        assert_eq!(&fields[18..20], ["1949.75", "CHF"]);
        assert_eq!(
            &fields[20..27],
            ["S", "Pia-Maria Rutschmann-Schnyder", "Grosse Marktgasse", "28", "9400", "Rorschach", "CH"]
        );
        assert_eq!(&fields[27..29], ["QRR", "000000000000000000000000420"]);
        assert_eq!(&fields[29..], ["INV-2024-042", "EPD"]);
        assert!(payload.warnings.is_empty());
    }

    #[test]
    fn test_field_count_constant_with_empty_optionals() {
        let mut data = invoice();
        data.address_2.clear();
        data.client_surname.clear();
        data.document_number.clear();

        let payload = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap();
        assert_eq!(payload.field_count(), PAYLOAD_FIELD_COUNT);
        assert_eq!(payload.to_qr_string().split('\n').count(), PAYLOAD_FIELD_COUNT);
        assert_eq!(payload.fields()[23], "");
        assert_eq!(payload.fields()[29], "");
    }

    #[test]
    fn test_negative_amount_fails() {
        let mut data = invoice();
        data.total = Decimal::from_str("-5.00").unwrap();

        let errors = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap_err();
        assert!(errors.has_field("total"));
    }

    #[test]
    fn test_unsupported_currency_fails() {
        let mut data = invoice();
        data.currency = "USD".to_string();

        let errors = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap_err();
        assert!(errors.has_field("currency"));
        assert!(errors.to_message().contains("USD"));
    }

    #[test]
    fn test_amount_limits() {
        let encoder = PayloadEncoder::new(creditor());
        let mut data = invoice();

        data.total = Decimal::from_str("0").unwrap();
        assert!(encoder.encode(&data, &reference()).is_err());

        data.total = Decimal::from_str("10.005").unwrap();
        assert!(encoder.encode(&data, &reference()).is_err());

        data.total = Decimal::from_str("1000000000.00").unwrap();
        assert!(encoder.encode(&data, &reference()).is_err());

        data.total = Decimal::from_str("999999999.99").unwrap();
        assert!(encoder.encode(&data, &reference()).is_ok());

        data.total = Decimal::from_str("12.5").unwrap();
        assert_eq!(encoder.encode(&data, &reference()).unwrap().amount, "12.50");
    }

    #[test]
    fn test_classic_iban_fails() {
        let mut info = creditor();
        info.iban = "CH93 0076 2011 6238 5295 7".to_string();

        let errors = PayloadEncoder::new(info).encode(&invoice(), &reference()).unwrap_err();
        assert!(errors.has_field("creditor.iban"));
    }

    #[test]
    fn test_collects_every_failure() {
        let mut data = invoice();
        data.total = Decimal::from_str("-5.00").unwrap();
        data.currency = "USD".to_string();
        data.city = " ".to_string();

        let errors = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.has_field("debtor.city"));
    }

    #[test]
    fn test_over_long_fields_are_truncated_with_warning() {
        let mut data = invoice();
        data.city = "A".repeat(50);
        data.document_number = "x".repeat(200);

        let payload = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap();
        assert_eq!(payload.debtor.town.chars().count(), 35);
        assert_eq!(payload.message.chars().count(), 140);
        assert_eq!(payload.warnings.len(), 2);
        assert_eq!(payload.warnings[0].field, "debtor.city");
        assert_eq!(payload.warnings[0].original_length, 50);
    }

    #[test]
    fn test_line_breaks_do_not_shift_fields() {
        let mut data = invoice();
        data.address_1 = "Grosse Marktgasse\nHinterhaus".to_string();
        data.city = "Rorschach\r\n".to_string();
        data.document_number = "INV-2024-042\tpart 1".to_string();

        let payload = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap();
        let qr = payload.to_qr_string();

        assert_eq!(qr.split('\n').count(), PAYLOAD_FIELD_COUNT);
        assert!(!qr.contains('\r'));
        assert_eq!(payload.debtor.line_1, "Grosse Marktgasse Hinterhaus");
        assert_eq!(payload.debtor.town, "Rorschach");
        assert_eq!(payload.message, "INV-2024-042 part 1");
        assert_eq!(qr.split('\n').last(), Some("EPD"));
    }

    #[test]
    fn test_display_amount_groups_thousands() {
        let mut data = invoice();
        data.total = Decimal::from_str("1234567.5").unwrap();
        let payload = PayloadEncoder::new(creditor()).encode(&data, &reference()).unwrap();
        assert_eq!(payload.display_amount(), "1 234 567.50");
    }

    #[test]
    fn test_display_lines() {
        let payload = PayloadEncoder::new(creditor()).encode(&invoice(), &reference()).unwrap();
        assert_eq!(
            payload.debtor.display_lines(),
            vec!["Pia-Maria Rutschmann-Schnyder", "Grosse Marktgasse 28", "9400 Rorschach"]
        );
        assert_eq!(payload.creditor.display_lines().len(), 3);
    }
}
