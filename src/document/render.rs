//! Rendering collaborator interface.
//!
//! A backend opens one session per document. The session receives the
//! body markup, reports how tall it rendered, and draws the payment slip
//! at absolute page coordinates.

use std::io;
use thiserror::Error;

use super::options::{ComplianceEmbedding, Protection};
use crate::qrbill::PlacedSlip;

/// Errors that can occur while rendering a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] io::Error),
    #[error("failed to write render input '{name}': {source}")]
    WriteInput {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to execute {tool}: {source}")]
    ToolIo {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} exited with status {code}: {stderr}")]
    ToolExit {
        tool: String,
        code: i32,
        stderr: String,
    },
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] io::Error),
    #[error("failed to measure rendered content: {0}")]
    Measure(String),
    #[error("failed to encode QR code: {0}")]
    QrCode(String),
    #[error("render backend failure: {0}")]
    Backend(String),
}

/// One document being rendered.
///
/// Archival marking and protection must be configured before any markup is
/// written; `finish` consumes the session and returns the PDF bytes.
pub trait RenderSession {
    /// Mark the output as archival-format compliant and embed the metadata
    /// and attachments.
    fn mark_archival(&mut self, embedding: &ComplianceEmbedding) -> Result<(), RenderError>;

    fn protect(&mut self, protection: &Protection) -> Result<(), RenderError>;

    fn set_footer(&mut self, markup: &str);

    fn set_watermark(&mut self, text: &str);

    fn write_markup(&mut self, markup: &str) -> Result<(), RenderError>;

    /// Height in millimetres of the content on the current page, measured
    /// from the top margin.
    fn content_height_mm(&mut self) -> Result<f64, RenderError>;

    fn add_page(&mut self);

    fn draw_slip(&mut self, slip: &PlacedSlip) -> Result<(), RenderError>;

    fn finish(self: Box<Self>) -> Result<Vec<u8>, RenderError>;
}

/// Factory for render sessions.
pub trait RenderBackend: Send + Sync {
    fn begin(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}
