use std::sync::Arc;

use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::info;

use income_predictor::config::Settings;
use income_predictor::engine::SubprocessPredictor;
use income_predictor::inference::PredictionService;
use income_predictor::routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let settings = Settings::from_env().context("invalid configuration")?;

    info!("🚀 Starting income prediction bridge");

    let predictor = Arc::new(SubprocessPredictor::new(settings.engine.clone()));
    let service = web::Data::new(
        PredictionService::new(predictor).with_strict_validation(settings.strict_validation),
    );

    let bind_address = settings.bind_address();
    info!("🌐 Listening on http://{}", bind_address);
    info!("👷 Workers: {}", settings.workers);
    info!(
        "🧠 Engine: `{}` (timeout {:?}, output cap {} bytes)",
        service.describe(),
        settings.engine.timeout,
        settings.engine.max_output_bytes
    );
    info!("🔓 Allowed origins: {}", settings.allowed_origins.join(", "));
    info!("🔧 Endpoints:");
    info!("   GET  /health   - Liveness");
    info!("   POST /predict  - Income bracket prediction");

    let workers = settings.workers;
    let max_body_bytes = settings.max_body_bytes;
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(routes::cors(&settings))
            .app_data(service.clone())
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .configure(routes::configure)
    })
    .workers(workers)
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await
    .context("server terminated with an error")
}
