//! Structural checks and categorical substitution applied before dispatch.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{NormalizedPayload, PredictionRequest};
use crate::schema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input data is missing, empty or not a JSON object")]
    EmptyPayload,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{field} must be an integer between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: String,
    },

    #[error("unknown {field} value: {value}")]
    UnknownCategory { field: &'static str, value: String },
}

/// Parses a raw request body. Anything that is not a JSON object with at least
/// one key is rejected.
pub fn parse_body(body: &[u8]) -> Result<PredictionRequest, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::EmptyPayload);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => {
            let request = PredictionRequest::new(fields);
            validate(&request)?;
            Ok(request)
        }
        _ => Err(ValidationError::EmptyPayload),
    }
}

pub fn validate(request: &PredictionRequest) -> Result<(), ValidationError> {
    if request.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }
    Ok(())
}

/// Deterministic substitution of the education label by its rank, and of
/// numeric strings by integers. Everything else passes through unchanged.
pub fn normalize(request: &PredictionRequest) -> NormalizedPayload {
    let mut fields: Map<String, Value> = request.fields().clone();

    let rank = fields
        .get(schema::EDUCATION)
        .and_then(Value::as_str)
        .and_then(schema::education_rank);
    if let Some(rank) = rank {
        fields.remove(schema::EDUCATION);
        fields.insert(schema::EDUCATION_NUM.to_string(), Value::from(rank));
    }

    for field in schema::NUMERIC_FIELDS {
        if let Some(value) = fields.get_mut(field) {
            if let Some(number) = value.as_str().and_then(|s| s.trim().parse::<i64>().ok()) {
                *value = Value::from(number);
            }
        }
    }

    NormalizedPayload::new(fields)
}

/// Semantic checks the presentation layer normally performs. Only run when
/// strict validation is enabled.
pub fn validate_strict(payload: &NormalizedPayload) -> Result<(), ValidationError> {
    for field in schema::REQUIRED_FIELDS {
        match payload.get(field) {
            None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ValidationError::MissingField(field))
            }
            Some(_) => {}
        }
    }

    for (field, min, max) in schema::NUMERIC_BOUNDS {
        let value = payload.get(field).ok_or(ValidationError::MissingField(field))?;
        match value.as_i64() {
            Some(n) if (min..=max).contains(&n) => {}
            _ => {
                return Err(ValidationError::OutOfRange {
                    field,
                    min,
                    max,
                    value: display(value),
                })
            }
        }
    }

    for (field, domain) in schema::CATEGORICAL_DOMAINS {
        let value = payload.get(field).ok_or(ValidationError::MissingField(field))?;
        let known = value.as_str().is_some_and(|s| domain.contains(&s));
        if !known {
            return Err(ValidationError::UnknownCategory {
                field,
                value: display(value),
            });
        }
    }

    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
