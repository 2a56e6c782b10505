use actix_cors::Cors;
use actix_web::http::{header, Method};
use actix_web::{web, HttpResponse, Responder};
use log::warn;

use crate::config::Settings;
use crate::error::ApiError;
use crate::inference::PredictionService;
use crate::models::{ErrorBody, HealthStatus};

async fn health_check(service: web::Data<PredictionService>) -> impl Responder {
    HttpResponse::Ok().json(HealthStatus::ok(service.describe()))
}

async fn predict(
    service: web::Data<PredictionService>,
    body: Result<web::Bytes, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map_err(|e| {
        warn!("rejected /predict body: {}", e);
        ApiError::from(e)
    })?;
    let result = service.dispatch(&body).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody::new("Endpoint not found"))
}

/// Registers every route. Shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/predict", web::post().to(predict))
        .default_service(web::route().to(not_found));
}

/// Cross-origin policy for the presentation layer.
pub fn cors(settings: &Settings) -> Cors {
    settings
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allowed_headers(vec![
            header::ORIGIN,
            header::HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .max_age(3600)
}
