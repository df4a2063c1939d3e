//! QR-IBAN checks.
//!
//! Only Swiss and Liechtenstein IBANs whose institution id lies in the
//! reserved range 30000-31999 may carry a QR reference.

use super::validation::ValidationError;

const IBAN_LENGTH: usize = 21;
const QR_IID_RANGE: std::ops::RangeInclusive<u32> = 30000..=31999;

/// Strip whitespace and uppercase.
pub fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// ISO 13616 mod-97 remainder; a valid IBAN yields 1.
fn mod97(iban: &str) -> Option<u32> {
    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let value = c.to_digit(36)?;
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    Some(remainder)
}

/// Validate a QR-IBAN and return its normalized form.
pub fn validate_qr_iban(field: &str, iban: &str) -> Result<String, ValidationError> {
    let iban = normalize(iban);

    if iban.len() != IBAN_LENGTH || !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::not_qr_iban(
            field,
            format!("Account must be a {} character IBAN", IBAN_LENGTH),
        ));
    }

    if !matches!(&iban[..2], "CH" | "LI") {
        return Err(ValidationError::not_qr_iban(
            field,
            "Only CH and LI accounts can be used on a QR-bill",
        ));
    }

    if mod97(&iban) != Some(1) {
        return Err(ValidationError::not_qr_iban(field, "IBAN checksum is invalid"));
    }

    let iid = iban[4..9].parse::<u32>().unwrap_or(0);
    if !QR_IID_RANGE.contains(&iid) {
        return Err(ValidationError::not_qr_iban(
            field,
            format!("IBAN with institution id {} is not a QR-IBAN", &iban[4..9]),
        ));
    }

    Ok(iban)
}

pub fn is_qr_iban(iban: &str) -> bool {
    validate_qr_iban("iban", iban).is_ok()
}

/// Print form in blocks of four characters.
pub fn format_iban(iban: &str) -> String {
    normalize(iban)
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
