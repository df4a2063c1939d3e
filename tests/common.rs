#![allow(dead_code)]

use qrbill_docs_server::archive::index::ArchiveIndex;
use qrbill_docs_server::archive::{ArchiveManager, StoragePolicy};
use qrbill_docs_server::config::CreditorInfo;
use qrbill_docs_server::document::options::{ComplianceEmbedding, Protection};
use qrbill_docs_server::document::{DocumentAssembler, RenderBackend, RenderError, RenderSession};
use qrbill_docs_server::qrbill::{InvoicePaymentData, Language, PayloadEncoder, PlacedSlip, SlipLayout};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call made on a render session.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    MarkArchival { attachments: usize },
    Protect(String),
    Footer(String),
    Watermark(String),
    Markup(String),
    Measure,
    AddPage,
    DrawSlip { needs_new_page: bool },
    Finish,
}

/// Render backend that records every call instead of producing a real PDF.
#[derive(Clone)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    slips: Arc<Mutex<Vec<PlacedSlip>>>,
    sessions: Arc<AtomicUsize>,
    content_height_mm: f64,
    fail_on_finish: bool,
}

impl RecordingBackend {
    pub fn new(content_height_mm: f64) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            slips: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(AtomicUsize::new(0)),
            content_height_mm,
            fail_on_finish: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_on_finish: true,
            ..Self::new(50.0)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn slips(&self) -> Vec<PlacedSlip> {
        self.slips.lock().unwrap().clone()
    }

    /// Number of documents rendered so far.
    pub fn renders(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

struct RecordingSession {
    backend: RecordingBackend,
    number: usize,
}

impl RecordingSession {
    fn record(&self, call: Call) {
        self.backend.calls.lock().unwrap().push(call);
    }
}

impl RenderBackend for RecordingBackend {
    fn begin(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let number = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(Call::Begin);
        Ok(Box::new(RecordingSession {
            backend: self.clone(),
            number,
        }))
    }
}

impl RenderSession for RecordingSession {
    fn mark_archival(&mut self, embedding: &ComplianceEmbedding) -> Result<(), RenderError> {
        self.record(Call::MarkArchival {
            attachments: embedding.attachments.len(),
        });
        Ok(())
    }

    fn protect(&mut self, protection: &Protection) -> Result<(), RenderError> {
        self.record(Call::Protect(protection.password.clone()));
        Ok(())
    }

    fn set_footer(&mut self, markup: &str) {
        self.record(Call::Footer(markup.to_string()));
    }

    fn set_watermark(&mut self, text: &str) {
        self.record(Call::Watermark(text.to_string()));
    }

    fn write_markup(&mut self, markup: &str) -> Result<(), RenderError> {
        self.record(Call::Markup(markup.to_string()));
        Ok(())
    }

    fn content_height_mm(&mut self) -> Result<f64, RenderError> {
        self.record(Call::Measure);
        Ok(self.backend.content_height_mm)
    }

    fn add_page(&mut self) {
        self.record(Call::AddPage);
    }

    fn draw_slip(&mut self, slip: &PlacedSlip) -> Result<(), RenderError> {
        self.record(Call::DrawSlip {
            needs_new_page: slip.needs_new_page,
        });
        self.backend.slips.lock().unwrap().push(slip.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError> {
        self.record(Call::Finish);
        if self.backend.fail_on_finish {
            return Err(RenderError::ToolExit {
                tool: "typst".to_string(),
                code: 1,
                stderr: "error: unexpected end of block".to_string(),
            });
        }
        Ok(format!("%PDF-1.7 render #{}", self.number).into_bytes())
    }
}

pub fn creditor() -> CreditorInfo {
    CreditorInfo {
        name: "Robert Schneider AG".to_string(),
        street: "Rue du Lac 1268".to_string(),
        city: "2501 Biel".to_string(),
        country: "CH".to_string(),
        iban: "CH44 3199 9123 0008 8901 2".to_string(),
    }
}

pub fn payment_data() -> InvoicePaymentData {
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

pub fn assembler(backend: &RecordingBackend) -> DocumentAssembler {
    DocumentAssembler::new(
        Arc::new(backend.clone()),
        PayloadEncoder::new(creditor()),
        SlipLayout::new(Language::Fr),
        Some("000000".to_string()),
        "COPY",
    )
}

pub fn manager(backend: &RecordingBackend, root: &Path) -> ArchiveManager {
    manager_with_policy(backend, root, StoragePolicy::default())
}

pub fn manager_with_policy(backend: &RecordingBackend, root: &Path, policy: StoragePolicy) -> ArchiveManager {
    ArchiveManager::new(
        assembler(backend),
        ArchiveIndex::new(root.join("archive")),
        root.join("temp"),
        policy,
    )
}
