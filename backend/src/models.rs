use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw record submitted by the client: field name to string or integer value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    fields: Map<String, Value>,
}

impl PredictionRequest {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Request after categorical substitution, in the shape the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedPayload {
    fields: Map<String, Value>,
}

impl NormalizedPayload {
    pub(crate) fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Single command-line argument handed to the engine.
    pub fn to_argument(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.fields)
    }
}

/// Outcome reported by the engine. Doubles as the engine's stdout envelope and
/// the 200 response body: `prediction` and any other members the engine wrote
/// are relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PredictionResult {
    pub fn new(prediction: impl Into<Value>) -> Self {
        Self {
            prediction: prediction.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
        }
    }

    pub fn with_details(error: &str, details: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            details: Some(details.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: String,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn ok(engine: String) -> Self {
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            engine,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn engine_envelope_is_relayed_verbatim() {
        let result: PredictionResult =
            serde_json::from_str("{\"prediction\": \">50K\", \"score\": 0.91}\n").unwrap();
        assert_eq!(result.prediction, json!(">50K"));
        assert_eq!(result.extra.get("score"), Some(&json!(0.91)));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"prediction": ">50K", "score": 0.91})
        );

        let bare = serde_json::to_value(PredictionResult::new("<=50K")).unwrap();
        assert_eq!(bare, json!({"prediction": "<=50K"}));

        let nested: PredictionResult =
            serde_json::from_str(r#"{"prediction": {"label": "<=50K", "p": 0.2}}"#).unwrap();
        assert_eq!(nested.prediction, json!({"label": "<=50K", "p": 0.2}));
    }

    #[test]
    fn engine_envelope_requires_prediction() {
        assert!(serde_json::from_str::<PredictionResult>(r#"{"label": ">50K"}"#).is_err());
        assert!(serde_json::from_str::<PredictionResult>("\">50K\"").is_err());
    }

    #[test]
    fn error_body_omits_missing_details() {
        let plain = serde_json::to_value(ErrorBody::new("Failed to parse prediction result")).unwrap();
        assert_eq!(plain, json!({"error": "Failed to parse prediction result"}));

        let detailed =
            serde_json::to_value(ErrorBody::with_details("Prediction failed", "boom")).unwrap();
        assert_eq!(detailed, json!({"error": "Prediction failed", "details": "boom"}));
    }

    #[test]
    fn payload_argument_is_compact_json() {
        let mut fields = Map::new();
        fields.insert("age".into(), json!(39));
        fields.insert("sex".into(), json!("Male"));
        let payload = NormalizedPayload::new(fields);
        assert_eq!(payload.to_argument().unwrap(), r#"{"age":39,"sex":"Male"}"#);
    }
}
