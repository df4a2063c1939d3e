//! HTTP surface of the document service.

pub mod handlers;

use actix_web::{error, web, HttpResponse};
use std::sync::Arc;

use crate::archive::ArchiveManager;
use crate::config::{AppConfig, PdfSettings};
use crate::ErrorResponse;

/// State shared by all workers. Read-only after startup.
pub struct AppState {
    pub manager: Arc<ArchiveManager>,
    pub settings: PdfSettings,
}

impl AppState {
    pub fn new(manager: ArchiveManager, settings: PdfSettings) -> Self {
        Self {
            manager: Arc::new(manager),
            settings,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ArchiveManager::from_config(config), config.settings.clone())
    }
}

/// Malformed request bodies get the same JSON error shape as everything else.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ErrorResponse::bad_request(&err.to_string()));
        error::InternalError::from_response(err, response).into()
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
    cfg.service(
        web::resource("/documents/{filename}").route(web::post().to(handlers::generate_document)),
    );
}
