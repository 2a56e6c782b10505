use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::error::{ApiError, EngineError};
use crate::models::{NormalizedPayload, PredictionRequest, PredictionResult};
use crate::normalizer;

/// Anything able to turn a normalized record into a prediction.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, payload: &NormalizedPayload) -> Result<PredictionResult, EngineError>;

    /// Short human-readable description, used in logs and `/health`.
    fn describe(&self) -> String;
}

/// Dispatcher behind `POST /predict`: validate, normalize, predict once.
#[derive(Clone)]
pub struct PredictionService {
    predictor: Arc<dyn Predictor>,
    strict_validation: bool,
}

impl PredictionService {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self {
            predictor,
            strict_validation: false,
        }
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn describe(&self) -> String {
        self.predictor.describe()
    }

    /// Runs one prediction for a raw request body. The predictor is invoked
    /// at most once and never for a body that fails validation.
    pub async fn dispatch(&self, body: &[u8]) -> Result<PredictionResult, ApiError> {
        let start_time = Instant::now();

        let request = normalizer::parse_body(body).map_err(|e| {
            warn!("rejected prediction request: {}", e);
            e
        })?;
        self.predict(&request).await.map(|result| {
            info!(
                "prediction {} in {} ms",
                result.prediction,
                start_time.elapsed().as_millis()
            );
            result
        })
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, ApiError> {
        normalizer::validate(request)?;
        let payload = normalizer::normalize(request);
        if self.strict_validation {
            normalizer::validate_strict(&payload).map_err(|e| {
                warn!("rejected prediction request: {}", e);
                e
            })?;
        }

        self.predictor.predict(&payload).await.map_err(|e| {
            match &e {
                EngineError::Malformed { reason, output } => {
                    error!("engine result could not be parsed ({}): {:?}", reason, output)
                }
                e if e.is_dispatch_failure() => {
                    error!("could not run engine `{}`: {}", self.predictor.describe(), e)
                }
                e => error!("prediction failed: {}", e),
            }
            ApiError::Engine(e)
        })
    }
}
