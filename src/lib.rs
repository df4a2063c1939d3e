use actix_web::middleware::Compress;
use actix_web::{web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod archive;
pub mod config;
pub mod document;
pub mod http;
pub mod qrbill;

pub use crate::config::AppConfig;
pub use crate::http::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn unprocessable(message: &str) -> Self {
        Self::new("ValidationError", message)
    }

    pub fn bad_gateway(message: &str) -> Self {
        Self::new("RenderError", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::http::handlers::generate_document),
    components(
        schemas(
            http::handlers::GenerateDocumentRequest,
            http::handlers::DocumentPathResponse,
            qrbill::InvoicePaymentData,
            document::DocumentKind,
            document::options::ComplianceEmbedding,
            document::options::Attachment,
            document::options::AttachmentRelationship,
            archive::Access,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Documents", description = "Invoice and quote PDF generation with Swiss QR-bill payment slips.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Local server")
    )
)]
pub struct ApiDoc;

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}. Please check your .env file.", e);
            std::process::exit(1);
        }
    };

    let app_state = web::Data::new(AppState::from_config(&config));

    let prometheus = match PrometheusMetricsBuilder::new("qrbill_docs_server")
        .endpoint("/metrics")
        .build()
    {
        Ok(prometheus) => prometheus,
        Err(e) => {
            log::error!("Failed to create Prometheus metrics middleware: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Starting server at http://{}:{} (archive: {})",
        config.bind_address,
        config.port,
        config.paths.archive_dir.display()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .app_data(app_state.clone())
            .service(web::scope("/api").configure(http::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
