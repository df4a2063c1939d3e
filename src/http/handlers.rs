use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::archive::{Access, ArchiveError, Delivery, DocumentRequest, Obtained, Origin};
use crate::document::options::ComplianceEmbedding;
use crate::document::{DocumentError, DocumentKind, RenderOptions};
use crate::qrbill::InvoicePaymentData;
use crate::ErrorResponse;

pub const ORIGIN_HEADER: &str = "X-Document-Origin";
pub const TRUNCATED_HEADER: &str = "X-Truncated-Fields";

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateDocumentRequest {
    /// Typst markup of the document body
    pub markup: String,
    #[serde(default)]
    pub kind: DocumentKind,
    /// `shared` for guest links, `internal` for authenticated users
    #[serde(default)]
    pub access: Access,
    /// Return the PDF inline instead of a path on the server
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub password: Option<String>,
    /// Invoice payment data; appends the payment slip when present
    #[serde(default)]
    pub payment: Option<InvoicePaymentData>,
    /// Electronic invoicing metadata; produces an archival PDF when present
    #[serde(default)]
    pub compliance: Option<ComplianceEmbedding>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentPathResponse {
    pub path: String,
    pub origin: String,
}

fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Archive => "archive",
        Origin::Rendered => "rendered",
        Origin::RenderedUnpersisted => "rendered-unpersisted",
    }
}

fn error_response(error: &ArchiveError) -> HttpResponse {
    match error {
        ArchiveError::Document(DocumentError::Validation(errors)) => {
            log::info!("Rejected document request: {}", errors);
            HttpResponse::UnprocessableEntity().json(ErrorResponse::unprocessable(&errors.to_message()))
        }
        ArchiveError::Document(DocumentError::Render(e)) => {
            log::error!("Rendering failed: {}", e);
            HttpResponse::BadGateway().json(ErrorResponse::bad_gateway(&e.to_string()))
        }
        ArchiveError::Storage { .. } => {
            log::error!("{}", error);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&error.to_string()))
        }
    }
}

fn success_response(obtained: Obtained) -> HttpResponse {
    let origin = origin_label(obtained.origin);
    let truncated: Vec<&str> = obtained.warnings.iter().map(|w| w.field.as_str()).collect();

    match obtained.delivery {
        Delivery::Inline { filename, pdf } => {
            let mut response = HttpResponse::Ok();
            response
                .content_type("application/pdf")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}.pdf\"", filename),
                ))
                .insert_header((ORIGIN_HEADER, origin));
            if !truncated.is_empty() {
                response.insert_header((TRUNCATED_HEADER, truncated.join(",")));
            }
            response.body(pdf)
        }
        Delivery::File(path) => HttpResponse::Ok().json(DocumentPathResponse {
            path: path.to_string_lossy().into_owned(),
            origin: origin.to_string(),
        }),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Documents",
    post,
    path = "/documents/{filename}",
    request_body = GenerateDocumentRequest,
    responses(
        (status = 200, description = "PDF document inline, or the path it was written to", body = DocumentPathResponse, content_type = "application/json"),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 422, description = "Invalid payment data", body = ErrorResponse),
        (status = 502, description = "Rendering failed", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    params(
        ("filename" = String, Path, description = "Logical document filename, without extension")
    )
)]
pub async fn generate_document(
    filename: web::Path<String>,
    req: web::Json<GenerateDocumentRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let filename = filename.into_inner();
    let req = req.into_inner();
    log::info!(
        "Document request for '{}' ({:?}, {:?} access)",
        filename,
        req.kind,
        req.access
    );

    let options = RenderOptions::from_settings(&state.settings, &filename, req.kind)
        .with_password(req.password.as_deref())
        .with_compliance(req.compliance);

    let request = DocumentRequest {
        filename,
        kind: req.kind,
        access: req.access,
        output: req.stream.into(),
        body: req.markup,
        payment: req.payment,
        options,
    };

    let manager = state.manager.clone();
    match web::block(move || manager.obtain(request)).await {
        Ok(Ok(obtained)) => success_response(obtained),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("Document task failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Document generation was interrupted"))
        }
    }
}
