//! Archive manager.
//!
//! Decides per request whether a document is regenerated or served from
//! the archive, and where the result goes:
//!
//! - documents that are not archivable (quotes) are always rendered and
//!   either streamed or written to the temp directory;
//! - shared (guest) access to an invoice reuses the most recent archived
//!   copy and only renders when there is none;
//! - internal access to an invoice always renders and archives the result
//!   under today's date.

pub mod index;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::document::common::sanitize_filename;
use crate::document::{Document, DocumentAssembler, DocumentError, DocumentKind, RenderOptions};
use crate::qrbill::{InvoicePaymentData, TruncationWarning};
use index::{ArchiveIndex, ArchivedArtifact};

const FALLBACK_FILENAME: &str = "document";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn storage(path: &Path, source: io::Error) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Who is asking for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Guest through a shared link: served from the archive when possible
    Shared,
    /// Authenticated user: always sees current data
    #[default]
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Return the bytes for inline display
    Stream,
    /// Return a path on disk for a later download
    Path,
}

impl From<bool> for OutputMode {
    fn from(stream: bool) -> Self {
        if stream {
            Self::Stream
        } else {
            Self::Path
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Inline { filename: String, pdf: Vec<u8> },
    File(PathBuf),
}

/// Where the delivered document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Archive,
    Rendered,
    /// Rendered, but archiving failed and the fallback policy served it anyway
    RenderedUnpersisted,
}

#[derive(Debug, Clone)]
pub struct Obtained {
    pub delivery: Delivery,
    pub origin: Origin,
    pub warnings: Vec<TruncationWarning>,
}

/// What to do when an archive write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoragePolicy {
    /// Stream the rendered bytes even though they were not archived
    pub serve_unpersisted_on_failure: bool,
}

#[derive(Debug, Clone)]
pub struct DocumentRequest {
    /// Logical filename, without date prefix or extension
    pub filename: String,
    pub kind: DocumentKind,
    pub access: Access,
    pub output: OutputMode,
    pub body: String,
    pub payment: Option<InvoicePaymentData>,
    pub options: RenderOptions,
}

pub struct ArchiveManager {
    assembler: DocumentAssembler,
    index: ArchiveIndex,
    temp_dir: PathBuf,
    policy: StoragePolicy,
}

/// Write `bytes` next to `path` and rename it into place.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ArchiveError::storage(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| ArchiveError::storage(dir, e))?;
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| ArchiveError::storage(path, e))?;
    file.persist(path)
        .map_err(|e| ArchiveError::storage(path, e.error))?;
    Ok(())
}

impl ArchiveManager {
    pub fn new(
        assembler: DocumentAssembler,
        index: ArchiveIndex,
        temp_dir: impl Into<PathBuf>,
        policy: StoragePolicy,
    ) -> Self {
        Self {
            assembler,
            index,
            temp_dir: temp_dir.into(),
            policy,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DocumentAssembler::from_config(config),
            ArchiveIndex::new(&config.paths.archive_dir),
            &config.paths.temp_dir,
            StoragePolicy {
                serve_unpersisted_on_failure: config.serve_unpersisted_on_storage_failure,
            },
        )
    }

    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    pub fn obtain(&self, request: DocumentRequest) -> Result<Obtained, ArchiveError> {
        self.obtain_on(Local::now().date_naive(), request)
    }

    /// Serve `request` as if today were `today`.
    pub fn obtain_on(&self, today: NaiveDate, request: DocumentRequest) -> Result<Obtained, ArchiveError> {
        let filename = sanitize_filename(&request.filename, FALLBACK_FILENAME);

        if !request.kind.is_archivable() {
            return self.render_transient(&filename, &request);
        }

        if request.access == Access::Shared {
            let latest = self
                .index
                .latest(&filename)
                .map_err(|e| ArchiveError::storage(self.index.dir(), e))?;

            match latest {
                Some(artifact) => {
                    log::info!("Serving archived {} for shared access", artifact.path.display());
                    return self.deliver_archived(&filename, artifact, request.output);
                }
                None => log::info!("No archived copy of {}, rendering", filename),
            }
        }

        self.render_archived(today, &filename, &request)
    }

    fn render(&self, request: &DocumentRequest) -> Result<Document, ArchiveError> {
        let document = self.assembler.assemble(
            &request.body,
            &request.options,
            request.payment.as_ref(),
        )?;
        Ok(document)
    }

    fn render_transient(&self, filename: &str, request: &DocumentRequest) -> Result<Obtained, ArchiveError> {
        let document = self.render(request)?;

        let delivery = match request.output {
            OutputMode::Stream => Delivery::Inline {
                filename: filename.to_string(),
                pdf: document.pdf,
            },
            OutputMode::Path => {
                let path = self.temp_dir.join(format!("{}.pdf", filename));
                write_atomically(&path, &document.pdf).map_err(|e| {
                    log::error!("Failed to write temporary document: {}", e);
                    e
                })?;
                log::info!("Wrote temporary document {}", path.display());
                Delivery::File(path)
            }
        };

        Ok(Obtained {
            delivery,
            origin: Origin::Rendered,
            warnings: document.warnings,
        })
    }

    fn render_archived(
        &self,
        today: NaiveDate,
        filename: &str,
        request: &DocumentRequest,
    ) -> Result<Obtained, ArchiveError> {
        let document = self.render(request)?;
        let path = self.index.artifact_path(today, filename);

        let stored = self
            .index
            .ensure_dir()
            .map_err(|e| ArchiveError::storage(self.index.dir(), e))
            .and_then(|_| write_atomically(&path, &document.pdf));

        match stored {
            Ok(()) => {
                log::info!("Archived {}", path.display());
                let delivery = match request.output {
                    OutputMode::Stream => Delivery::Inline {
                        filename: filename.to_string(),
                        pdf: document.pdf,
                    },
                    OutputMode::Path => Delivery::File(path),
                };
                Ok(Obtained {
                    delivery,
                    origin: Origin::Rendered,
                    warnings: document.warnings,
                })
            }
            Err(e) if self.policy.serve_unpersisted_on_failure && request.output == OutputMode::Stream => {
                log::warn!("Serving {} without archiving it: {}", filename, e);
                Ok(Obtained {
                    delivery: Delivery::Inline {
                        filename: filename.to_string(),
                        pdf: document.pdf,
                    },
                    origin: Origin::RenderedUnpersisted,
                    warnings: document.warnings,
                })
            }
            Err(e) => {
                log::error!("Failed to archive {}: {}", filename, e);
                Err(e)
            }
        }
    }

    fn deliver_archived(
        &self,
        filename: &str,
        artifact: ArchivedArtifact,
        output: OutputMode,
    ) -> Result<Obtained, ArchiveError> {
        let delivery = match output {
            OutputMode::Stream => {
                let pdf = fs::read(&artifact.path)
                    .map_err(|e| ArchiveError::storage(&artifact.path, e))?;
                Delivery::Inline {
                    filename: filename.to_string(),
                    pdf,
                }
            }
            OutputMode::Path => Delivery::File(artifact.path),
        };

        Ok(Obtained {
            delivery,
            origin: Origin::Archive,
            warnings: Vec::new(),
        })
    }
}
