//! Document assembler.
//!
//! Renders the body, applies the per-document options and appends the
//! payment slip when payment data is supplied.

use std::sync::Arc;

use super::options::RenderOptions;
use super::render::RenderBackend;
use super::typst::TypstBackend;
use super::{Document, DocumentError};
use crate::config::AppConfig;
use crate::qrbill::reference;
use crate::qrbill::{InvoicePaymentData, PayloadEncoder, SlipLayout, SlipPayload};

pub struct DocumentAssembler {
    backend: Arc<dyn RenderBackend>,
    encoder: PayloadEncoder,
    layout: SlipLayout,
    bank_id: Option<String>,
    watermark_text: String,
}

impl DocumentAssembler {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        encoder: PayloadEncoder,
        layout: SlipLayout,
        bank_id: Option<String>,
        watermark_text: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            encoder,
            layout,
            bank_id,
            watermark_text: watermark_text.into(),
        }
    }

    /// Assembler backed by the Typst toolchain.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(TypstBackend::new(config.tools.clone())),
            PayloadEncoder::new(config.creditor.clone()),
            SlipLayout::new(config.language),
            config.bank_id.clone(),
            config.settings.watermark_text.clone(),
        )
    }

    /// Generate the reference and encode the slip payload for one invoice.
    pub fn prepare_slip(&self, payment: &InvoicePaymentData) -> Result<SlipPayload, DocumentError> {
        let reference = reference::generate(
            self.bank_id.as_deref(),
            &payment.document_id.to_string(),
        )?;
        let payload = self.encoder.encode(payment, &reference)?;
        Ok(payload)
    }

    /// Render one document.
    ///
    /// Payment data is validated before anything is rendered, so invalid
    /// data never reaches the backend.
    pub fn assemble(
        &self,
        body: &str,
        options: &RenderOptions,
        payment: Option<&InvoicePaymentData>,
    ) -> Result<Document, DocumentError> {
        let payload = payment.map(|p| self.prepare_slip(p)).transpose()?;

        let mut session = self.backend.begin()?;

        if let Some(compliance) = &options.compliance {
            session.mark_archival(compliance)?;
        }
        if let Some(protection) = &options.protection {
            session.protect(protection)?;
        }
        if let Some(footer) = &options.footer {
            session.set_footer(footer);
        }
        if options.watermark {
            session.set_watermark(&self.watermark_text);
        }

        session.write_markup(body)?;
        let content_height_mm = session.content_height_mm()?;

        let mut warnings = Vec::new();
        let slip = match payload {
            Some(payload) => {
                let placed = self.layout.place(&payload, content_height_mm)?;
                if placed.needs_new_page {
                    session.add_page();
                }
                session.draw_slip(&placed)?;
                warnings = payload.warnings;
                Some(placed)
            }
            None => None,
        };

        let pdf = session.finish()?;
        log::debug!(
            "assembled document: {} bytes, body height {:.1} mm, slip: {}",
            pdf.len(),
            content_height_mm,
            slip.is_some()
        );

        Ok(Document {
            pdf,
            content_height_mm,
            slip,
            warnings,
        })
    }
}
