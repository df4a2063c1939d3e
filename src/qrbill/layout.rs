//! Payment slip layout.
//!
//! The slip occupies a fixed 210 x 105 mm strip at the bottom of an A4
//! page: a 62 mm receipt on the left and a 148 mm payment part on the
//! right. Nothing here depends on the document content except the
//! page-break decision.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use super::iban::format_iban;
use super::payload::SlipPayload;
use super::validation::ValidationError;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const PAGE_MARGIN_TOP_MM: f64 = 12.0;
pub const PAGE_MARGIN_X_MM: f64 = 15.0;

pub const SLIP_HEIGHT_MM: f64 = 105.0;
pub const RECEIPT_WIDTH_MM: f64 = 62.0;
pub const PAYMENT_PART_WIDTH_MM: f64 = 148.0;
pub const QR_CODE_SIZE_MM: f64 = 46.0;
pub const SWISS_CROSS_SIZE_MM: f64 = 7.0;
const INNER_MARGIN_MM: f64 = 5.0;

/// Height available to content below the top margin.
pub const PRINTABLE_HEIGHT_MM: f64 = PAGE_HEIGHT_MM - PAGE_MARGIN_TOP_MM;

/// Body content taller than this leaves no room for the slip on its page.
pub const NEW_PAGE_THRESHOLD_MM: f64 = PRINTABLE_HEIGHT_MM - SLIP_HEIGHT_MM;

/// Smallest font size allowed anywhere on the slip.
pub const MIN_FONT_PT: f64 = 6.0;

/// Axis-aligned rectangle in millimetres, origin at the top-left page corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontSizes {
    pub title_pt: f64,
    pub receipt_heading_pt: f64,
    pub receipt_value_pt: f64,
    pub payment_heading_pt: f64,
    pub payment_value_pt: f64,
}

impl FontSizes {
    pub fn smallest(&self) -> f64 {
        [
            self.title_pt,
            self.receipt_heading_pt,
            self.receipt_value_pt,
            self.payment_heading_pt,
            self.payment_value_pt,
        ]
        .into_iter()
        .fold(f64::INFINITY, f64::min)
    }
}

/// Fixed geometry of every slip element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlipGeometry {
    pub panel: Rect,
    pub receipt: Rect,
    pub payment_part: Rect,
    pub receipt_title: Rect,
    pub receipt_information: Rect,
    pub receipt_amount: Rect,
    pub receipt_acceptance: Rect,
    pub payment_title: Rect,
    pub qr_code: Rect,
    pub swiss_cross: Rect,
    pub payment_amount: Rect,
    pub payment_information: Rect,
    pub fonts: FontSizes,
}

impl SlipGeometry {
    pub fn standard() -> Self {
        let top = PAGE_HEIGHT_MM - SLIP_HEIGHT_MM;
        let receipt_x = INNER_MARGIN_MM;
        let payment_x = RECEIPT_WIDTH_MM + INNER_MARGIN_MM;
        let qr_y = top + 17.0;
        let cross_offset = (QR_CODE_SIZE_MM - SWISS_CROSS_SIZE_MM) / 2.0;
        let info_x = payment_x + QR_CODE_SIZE_MM + INNER_MARGIN_MM;

        Self {
            panel: Rect::new(0.0, top, PAGE_WIDTH_MM, SLIP_HEIGHT_MM),
            receipt: Rect::new(0.0, top, RECEIPT_WIDTH_MM, SLIP_HEIGHT_MM),
            payment_part: Rect::new(RECEIPT_WIDTH_MM, top, PAYMENT_PART_WIDTH_MM, SLIP_HEIGHT_MM),
            receipt_title: Rect::new(receipt_x, top + 5.0, 52.0, 7.0),
            receipt_information: Rect::new(receipt_x, top + 12.0, 52.0, 56.0),
            receipt_amount: Rect::new(receipt_x, top + 68.0, 52.0, 14.0),
            receipt_acceptance: Rect::new(receipt_x, top + 82.0, 52.0, 18.0),
            payment_title: Rect::new(payment_x, top + 5.0, 51.0, 7.0),
            qr_code: Rect::new(payment_x, qr_y, QR_CODE_SIZE_MM, QR_CODE_SIZE_MM),
            swiss_cross: Rect::new(
                payment_x + cross_offset,
                qr_y + cross_offset,
                SWISS_CROSS_SIZE_MM,
                SWISS_CROSS_SIZE_MM,
            ),
            payment_amount: Rect::new(payment_x, top + 68.0, 51.0, 22.0),
            payment_information: Rect::new(
                info_x,
                top + 5.0,
                PAGE_WIDTH_MM - info_x - INNER_MARGIN_MM,
                85.0,
            ),
            fonts: FontSizes {
                title_pt: 11.0,
                receipt_heading_pt: 6.0,
                receipt_value_pt: 8.0,
                payment_heading_pt: 8.0,
                payment_value_pt: 10.0,
            },
        }
    }
}

/// Language of the slip headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    #[default]
    Fr,
    It,
    En,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" => Ok(Self::De),
            "fr" => Ok(Self::Fr),
            "it" => Ok(Self::It),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported slip language '{}'", other)),
        }
    }
}

struct Headings {
    receipt: &'static str,
    payment_part: &'static str,
    account: &'static str,
    reference: &'static str,
    additional_information: &'static str,
    payable_by: &'static str,
    currency: &'static str,
    amount: &'static str,
    acceptance_point: &'static str,
}

impl Language {
    fn headings(&self) -> Headings {
        match self {
            Self::De => Headings {
                receipt: "Empfangsschein",
                payment_part: "Zahlteil",
                account: "Konto / Zahlbar an",
                reference: "Referenz",
                additional_information: "Zusätzliche Informationen",
                payable_by: "Zahlbar durch",
                currency: "Währung",
                amount: "Betrag",
                acceptance_point: "Annahmestelle",
            },
            Self::Fr => Headings {
                receipt: "Récépissé",
                payment_part: "Section paiement",
                account: "Compte / Payable à",
                reference: "Référence",
                additional_information: "Informations supplémentaires",
                payable_by: "Payable par",
                currency: "Monnaie",
                amount: "Montant",
                acceptance_point: "Point de dépôt",
            },
            Self::It => Headings {
                receipt: "Ricevuta",
                payment_part: "Sezione pagamento",
                account: "Conto / Pagabile a",
                reference: "Riferimento",
                additional_information: "Informazioni supplementari",
                payable_by: "Pagabile da",
                currency: "Valuta",
                amount: "Importo",
                acceptance_point: "Punto di accettazione",
            },
            Self::En => Headings {
                receipt: "Receipt",
                payment_part: "Payment part",
                account: "Account / Payable to",
                reference: "Reference",
                additional_information: "Additional information",
                payable_by: "Payable by",
                currency: "Currency",
                amount: "Amount",
                acceptance_point: "Acceptance point",
            },
        }
    }
}

/// A heading with the value lines printed under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSection {
    pub heading: String,
    pub lines: Vec<String>,
}

/// Human-readable content of the slip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelText {
    pub receipt_title: String,
    pub payment_title: String,
    pub receipt_sections: Vec<PanelSection>,
    pub payment_sections: Vec<PanelSection>,
    pub currency_heading: String,
    pub amount_heading: String,
    pub currency: String,
    pub amount: String,
    pub acceptance_point: String,
}

impl PanelText {
    fn build(payload: &SlipPayload, language: Language) -> Self {
        let h = language.headings();

        let mut account = vec![format_iban(&payload.iban)];
        account.extend(payload.creditor.display_lines());

        let account = PanelSection {
            heading: h.account.to_string(),
            lines: account,
        };
        let reference = PanelSection {
            heading: h.reference.to_string(),
            lines: vec![payload.reference.formatted()],
        };
        let payable_by = PanelSection {
            heading: h.payable_by.to_string(),
            lines: payload.debtor.display_lines(),
        };

        let mut payment_sections = vec![account.clone(), reference.clone()];
        if !payload.message.is_empty() {
            payment_sections.push(PanelSection {
                heading: h.additional_information.to_string(),
                lines: vec![payload.message.clone()],
            });
        }
        payment_sections.push(payable_by.clone());

        Self {
            receipt_title: h.receipt.to_string(),
            payment_title: h.payment_part.to_string(),
            receipt_sections: vec![account, reference, payable_by],
            payment_sections,
            currency_heading: h.currency.to_string(),
            amount_heading: h.amount.to_string(),
            currency: payload.currency.code().to_string(),
            amount: payload.display_amount(),
            acceptance_point: h.acceptance_point.to_string(),
        }
    }
}

/// Everything the renderer needs to draw the slip.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedSlip {
    /// Insert a blank page before drawing the slip
    pub needs_new_page: bool,
    pub geometry: SlipGeometry,
    pub text: PanelText,
    /// Text encoded into the QR code
    pub qr_payload: String,
}

/// Decision rule for the page break, exposed on its own for callers that
/// only need the answer.
pub fn needs_new_page(rendered_content_height_mm: f64) -> bool {
    rendered_content_height_mm > NEW_PAGE_THRESHOLD_MM
}

/// Positions the slip on the rendered document.
#[derive(Debug, Clone)]
pub struct SlipLayout {
    language: Language,
    geometry: SlipGeometry,
}

impl SlipLayout {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            geometry: SlipGeometry::standard(),
        }
    }

    pub fn geometry(&self) -> &SlipGeometry {
        &self.geometry
    }

    pub fn place(
        &self,
        payload: &SlipPayload,
        rendered_content_height_mm: f64,
    ) -> Result<PlacedSlip, ValidationError> {
        if !rendered_content_height_mm.is_finite() || rendered_content_height_mm < 0.0 {
            return Err(ValidationError::new(
                "rendered_content_height_mm",
                format!(
                    "Rendered content height {} is not a valid length",
                    rendered_content_height_mm
                ),
            ));
        }

        let needs_new_page = needs_new_page(rendered_content_height_mm);
        log::debug!(
            "body height {:.1} mm, threshold {:.1} mm, new page: {}",
            rendered_content_height_mm,
            NEW_PAGE_THRESHOLD_MM,
            needs_new_page
        );

        Ok(PlacedSlip {
            needs_new_page,
            geometry: self.geometry,
            text: PanelText::build(payload, self.language),
            qr_payload: payload.to_qr_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_constant() {
        assert_eq!(NEW_PAGE_THRESHOLD_MM, 180.0);
        assert_eq!(PRINTABLE_HEIGHT_MM, 285.0);
    }

    #[test]
    fn test_needs_new_page_boundary() {
        assert!(!needs_new_page(0.0));
        assert!(!needs_new_page(NEW_PAGE_THRESHOLD_MM));
        assert!(needs_new_page(NEW_PAGE_THRESHOLD_MM + 0.01));
        assert!(needs_new_page(270.0));
    }

    #[test]
    fn test_geometry_is_contained() {
        let g = SlipGeometry::standard();
        let page = Rect::new(0.0, 0.0, PAGE_WIDTH_MM, PAGE_HEIGHT_MM);

        assert!(page.contains(&g.panel));
        assert_eq!(g.panel.bottom(), PAGE_HEIGHT_MM);
        assert_eq!(g.receipt.right(), g.payment_part.x);
        assert_eq!(g.payment_part.right(), PAGE_WIDTH_MM);

        for part in [g.receipt_title, g.receipt_information, g.receipt_amount, g.receipt_acceptance] {
            assert!(g.receipt.contains(&part), "{:?}", part);
        }
        for part in [g.payment_title, g.qr_code, g.payment_amount, g.payment_information] {
            assert!(g.payment_part.contains(&part), "{:?}", part);
        }
        assert!(g.qr_code.contains(&g.swiss_cross));
        assert!(g.qr_code.bottom() <= g.payment_amount.y);
        assert!(g.qr_code.right() <= g.payment_information.x);
    }

    #[test]
    fn test_panel_starts_below_threshold() {
        let g = SlipGeometry::standard();
        assert!(PAGE_MARGIN_TOP_MM + NEW_PAGE_THRESHOLD_MM <= g.panel.y);
    }

    #[test]
    fn test_fonts_are_legible() {
        assert!(SlipGeometry::standard().fonts.smallest() >= MIN_FONT_PT);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("DE".parse::<Language>().unwrap(), Language::De);
        assert_eq!(Language::default(), Language::Fr);
        assert!("rm".parse::<Language>().is_err());
    }
}
