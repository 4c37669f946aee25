// src/api/routes.rs
use actix_files::Files;
use actix_web::{error, web, HttpRequest, HttpResponse};
use log::warn;

use super::handlers;
use crate::config::WorkspaceSettings;
use crate::errors::ErrorKind;
use crate::models::{ApiError, GenerationFailure};
use crate::providers::LlmProvider;
use crate::workspace::Workspace;

pub fn configure_routes<P: LlmProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health", web::get().to(handlers::health_check))
            .route("/generate-animation", web::post().to(handlers::generate_animation::<P>)),
    );
}

/// Serves rendered videos so the returned `videoUrl` resolves against this server.
pub fn artifact_files(settings: &WorkspaceSettings) -> Files {
    Files::new("/animations", Workspace::served_dir(settings))
}

/// An unreadable body carries no usable prompt.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Malformed request body: {}", err);
    let failure = GenerationFailure::from(ErrorKind::Validation);
    let response = HttpResponse::BadRequest().json(ApiError::from(&failure));
    error::InternalError::from_response(err, response).into()
}
