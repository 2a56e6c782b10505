//! HTTP bridge between an income prediction form and an external engine
//! process.
//!
//! `POST /predict` bodies are validated and normalized ([`normalizer`]), then
//! handed to a [`inference::Predictor`]. The production predictor
//! ([`engine::SubprocessPredictor`]) runs one engine process per request and
//! turns its exit status and output into a prediction or an [`error::ApiError`].

pub mod config;
pub mod engine;
pub mod error;
pub mod inference;
pub mod models;
pub mod normalizer;
pub mod routes;
pub mod schema;
