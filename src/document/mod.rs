//! PDF document generation.
//!
//! The [`assembler::DocumentAssembler`] drives a [`render::RenderBackend`]
//! session: body markup first, then the optional payment slip.

pub mod assembler;
pub mod common;
pub mod options;
pub mod render;
pub mod typst;

use thiserror::Error;

use crate::qrbill::layout::{PRINTABLE_HEIGHT_MM, SLIP_HEIGHT_MM};
use crate::qrbill::{PlacedSlip, TruncationWarning, ValidationError, ValidationErrors};

pub use assembler::DocumentAssembler;
pub use options::{DocumentKind, RenderOptions};
pub use render::{RenderBackend, RenderError, RenderSession};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}

impl From<ValidationError> for DocumentError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error.into())
    }
}

/// A finished document.
#[derive(Debug, Clone)]
pub struct Document {
    pub pdf: Vec<u8>,
    /// Height of the body on its last page, measured from the top margin
    pub content_height_mm: f64,
    pub slip: Option<PlacedSlip>,
    pub warnings: Vec<TruncationWarning>,
}

impl Document {
    /// Height used on the page that carries the slip, or `None` without a slip.
    pub fn slip_page_occupied_height_mm(&self) -> Option<f64> {
        self.slip.as_ref().map(|slip| {
            let body = if slip.needs_new_page {
                0.0
            } else {
                self.content_height_mm
            };
            body + SLIP_HEIGHT_MM
        })
    }

    /// Whether the slip fits on its page without overlapping the body.
    pub fn slip_fits_page(&self) -> bool {
        self.slip_page_occupied_height_mm()
            .map_or(true, |height| height <= PRINTABLE_HEIGHT_MM)
    }
}
