//! External AI extraction collaborator.
//!
//! The model is a black box behind `FieldModel`: document text in, loosely
//! typed fields + overall confidence out. The HTTP implementation and the
//! mock live side by side so orchestrator tests never need a network.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::patterns::{
    ExtractedField, ExtractionResultSet, FieldSource, FieldValue, ProfileField,
};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot reach extraction model at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Cannot parse model response: {0}")]
    ResponseParsing(String),
}

/// Request sent to the model. One call covers the whole document — a single
/// call for all weak fields is cheaper than one call per field.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub document_id: Uuid,
    pub document_text: String,
    pub force_ai: bool,
}

/// Wire response. Field names and values are untyped on the wire and
/// validated into the schema at this boundary, never trusted implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub extracted_fields: BTreeMap<String, serde_json::Value>,
    pub confidence: f32,
    pub source: String,
    pub processing_time_ms: Option<u64>,
}

impl ModelResponse {
    /// Validate the wire fields into the typed schema. Unknown field names
    /// and non-scalar values are dropped with a warning.
    pub fn typed_fields(&self) -> BTreeMap<ProfileField, FieldValue> {
        let mut typed = BTreeMap::new();
        for (name, value) in &self.extracted_fields {
            let Some(field) = ProfileField::from_str(name) else {
                tracing::warn!(field = %name, "Model returned unknown field, dropping");
                continue;
            };
            let value = match value {
                serde_json::Value::String(s) if !s.trim().is_empty() => {
                    FieldValue::Text(s.trim().to_string())
                }
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(f) => FieldValue::Number(f),
                    None => continue,
                },
                _ => {
                    tracing::warn!(field = %name, "Model returned non-scalar value, dropping");
                    continue;
                }
            };
            typed.insert(field, value);
        }
        typed
    }
}

/// Build an extraction result set from a model response. Every field carries
/// the model's reported confidence and `source = ai`.
pub fn ai_result_set(response: &ModelResponse) -> ExtractionResultSet {
    let confidence = response.confidence.clamp(0.0, 1.0);
    response
        .typed_fields()
        .into_iter()
        .map(|(field, value)| {
            (
                field,
                ExtractedField::new(value, confidence, FieldSource::Ai),
            )
        })
        .collect()
}

/// The escalation seam. Idempotent from the orchestrator's point of view:
/// retries are safe.
#[async_trait]
pub trait FieldModel: Send + Sync {
    async fn extract_fields(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

/// HTTP client for the extraction model service.
pub struct HttpFieldModel {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFieldModel {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

#[async_trait]
impl FieldModel for HttpFieldModel {
    async fn extract_fields(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/v1/extract", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ModelError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    ModelError::Timeout(self.timeout_secs)
                } else {
                    ModelError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ModelResponse>()
            .await
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))
    }
}

/// Mock model for testing — configurable fields, failure mode and latency.
pub struct MockFieldModel {
    fields: BTreeMap<String, serde_json::Value>,
    confidence: f32,
    fail: bool,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockFieldModel {
    pub fn with_fields(fields: &[(&str, serde_json::Value)], confidence: f32) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            confidence,
            fail: false,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fields: BTreeMap::new(),
            confidence: 0.0,
            fail: true,
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl FieldModel for MockFieldModel {
    async fn extract_fields(&self, _request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ModelError::Connection("mock".to_string()));
        }
        Ok(ModelResponse {
            extracted_fields: self.fields.clone(),
            confidence: self.confidence,
            source: "mock-model".to_string(),
            processing_time_ms: Some(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_configured_fields() {
        let model = MockFieldModel::with_fields(
            &[("farm_name", serde_json::json!("Ferma Deal SRL"))],
            0.8,
        );
        let request = ModelRequest {
            document_id: Uuid::new_v4(),
            document_text: "text".into(),
            force_ai: false,
        };
        let response = model.extract_fields(&request).await.unwrap();
        assert_eq!(response.confidence, 0.8);
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn unknown_wire_fields_dropped() {
        let response = ModelResponse {
            extracted_fields: [
                ("farm_name".to_string(), serde_json::json!("Ferme du Lac")),
                ("tractor_count".to_string(), serde_json::json!(3)),
            ]
            .into_iter()
            .collect(),
            confidence: 0.8,
            source: "m".into(),
            processing_time_ms: None,
        };
        let typed = response.typed_fields();
        assert_eq!(typed.len(), 1);
        assert!(typed.contains_key(&ProfileField::FarmName));
    }

    #[test]
    fn non_scalar_values_dropped() {
        let response = ModelResponse {
            extracted_fields: [
                ("farm_name".to_string(), serde_json::json!({"nested": true})),
                ("turnover".to_string(), serde_json::json!(120000.0)),
                ("address".to_string(), serde_json::json!("")),
            ]
            .into_iter()
            .collect(),
            confidence: 0.8,
            source: "m".into(),
            processing_time_ms: None,
        };
        let typed = response.typed_fields();
        assert_eq!(typed.len(), 1);
        assert_eq!(
            typed.get(&ProfileField::Turnover),
            Some(&FieldValue::Number(120000.0))
        );
    }

    #[test]
    fn ai_result_set_tags_source_and_clamps_confidence() {
        let response = ModelResponse {
            extracted_fields: [("farm_name".to_string(), serde_json::json!("X"))]
                .into_iter()
                .collect(),
            confidence: 1.4,
            source: "m".into(),
            processing_time_ms: None,
        };
        let set = ai_result_set(&response);
        let field = set.get(&ProfileField::FarmName).unwrap();
        assert_eq!(field.source, FieldSource::Ai);
        assert_eq!(field.confidence, 1.0);
    }
}
