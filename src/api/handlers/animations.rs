// src/api/handlers/animations.rs
use actix_web::{web, HttpResponse, Result};

use crate::api::AppState;
use crate::models::{ApiError, GenerationRequest};
use crate::providers::LlmProvider;

pub async fn generate_animation<P: LlmProvider + 'static>(
    state: web::Data<AppState<P>>,
    req: web::Json<GenerationRequest>,
) -> Result<HttpResponse> {
    match state.pipeline.respond(&req).await {
        Ok(result) => Ok(HttpResponse::Ok().json(result)),
        Err(failure) => {
            let body = ApiError::from(&failure);
            match failure.http_status {
                400 => Ok(HttpResponse::BadRequest().json(body)),
                _ => Ok(HttpResponse::InternalServerError().json(body)),
            }
        }
    }
}
