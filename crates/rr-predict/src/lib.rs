//! HTTP client for the pit-decision classifier service.
//!
//! The classifier is an external service consumed only through its
//! prediction contract: a feature vector in the declared schema order plus
//! a circuit, answered with a PIT / NO_PIT decision and probabilities.
//! Every failure mode maps to a [`PredictError`] so the engine's advisory
//! bridge can degrade to "no advisory" without caring why.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rr_core::advisory::{
    ClassifierError, FEATURE_SCHEMA, FeatureVector, PitClassifier, PitDecision, Prediction,
};
use rr_core::types::{CircuitId, Confidence};

/// Default request timeout for prediction calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const PREDICT_PATH: &str = "/predict";

/// Classifier client errors.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The provided base URL was unusable.
    #[error("invalid base URL: {reason}")]
    InvalidBaseUrl { reason: &'static str },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service returned an error response.
    #[error("classifier error: {message}")]
    Api { message: String },
    /// The service answered with something the contract does not allow.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Blocking HTTP client for the prediction service.
pub struct Client {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or whitespace-only, or if the
    /// HTTP client fails to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PredictError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(PredictError::InvalidBaseUrl {
                reason: "base URL cannot be empty",
            });
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(PredictError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Requests a pit decision for one feature vector.
    pub fn predict(
        &self,
        features: &FeatureVector,
        circuit: &CircuitId,
    ) -> Result<Prediction, PredictError> {
        let request = PredictionRequest::new(features, circuit);
        let url = format!("{}{PREDICT_PATH}", self.base_url);

        let response = self.http.post(&url).json(&request).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| PredictError::Api {
                message: format!("status {status}: {body}"),
            }));
        }

        let payload: PredictionResponse = serde_json::from_str(&body)
            .map_err(|err| PredictError::InvalidResponse(err.to_string()))?;
        payload.into_prediction()
    }
}

impl PitClassifier for Client {
    fn predict(
        &self,
        features: &FeatureVector,
        circuit: &CircuitId,
    ) -> Result<Prediction, ClassifierError> {
        Self::predict(self, features, circuit).map_err(Into::into)
    }
}

/// Wire form of a prediction request.
#[derive(Debug, Serialize)]
struct PredictionRequest {
    /// Values in schema order.
    features: Vec<f64>,
    /// The schema the values follow; lets the service reject drift.
    feature_names: Vec<&'static str>,
    /// Circuit name, for the service's own encoder and logs.
    circuit: String,
}

impl PredictionRequest {
    fn new(features: &FeatureVector, circuit: &CircuitId) -> Self {
        Self {
            features: features.to_values().to_vec(),
            feature_names: FEATURE_SCHEMA.to_vec(),
            circuit: circuit.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    decision: String,
    confidence: Confidence,
    pit_probability: Confidence,
}

impl PredictionResponse {
    fn into_prediction(self) -> Result<Prediction, PredictError> {
        let decision = parse_decision(&self.decision)?;
        Ok(Prediction {
            decision,
            confidence: self.confidence,
            pit_probability: self.pit_probability,
        })
    }
}

fn parse_decision(raw: &str) -> Result<PitDecision, PredictError> {
    match raw {
        "PIT" => Ok(PitDecision::Pit),
        // Older service builds spell the negative with a space.
        "NO_PIT" | "NO PIT" => Ok(PitDecision::NoPit),
        other => Err(PredictError::InvalidResponse(format!(
            "unknown decision `{other}`"
        ))),
    }
}

fn parse_api_error(body: &str) -> Option<PredictError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| PredictError::Api {
            message: payload.error.message,
        })
}
