//! Request handlers for the tagging service
//!
//! Every handler answers with HTTP 200; failures are reported inside the JSON body.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use log::{debug, error, warn};

use crate::tagger::{TaggerError, TaggingPipeline};

/// Shared state for handlers
pub struct HandlerState {
    pub pipeline: Arc<TaggingPipeline>,
}

impl HandlerState {
    pub fn new(pipeline: Arc<TaggingPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub source: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TagResponse {
    pub success: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TagResponse {
    pub fn succeeded(tags: &[String]) -> Self {
        Self {
            success: "true",
            tags: Some(tags.join(";")),
            error: None,
        }
    }

    pub fn failed(err: &TaggerError) -> Self {
        Self {
            success: "false",
            tags: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HealthResponse {
    pub health: &'static str,
}

/// Replaces newlines with spaces and trims surrounding whitespace.
pub fn normalize_source(source: &str) -> String {
    source.replace('\n', " ").trim().to_string()
}

/// Extracts and normalizes `source` from a raw request body.
pub fn parse_request(body: &[u8]) -> Result<String, TaggerError> {
    let request: TagRequest = serde_json::from_slice(body)
        .map_err(|e| TaggerError::MalformedInput(e.to_string()))?;
    Ok(normalize_source(&request.source))
}

/// Tagging endpoint
///
/// The body is read as raw bytes: a missing content type or invalid JSON must
/// come back as a malformed-input response, not a 4xx rejection.
pub async fn tag_handler(State(state): State<Arc<HandlerState>>, body: Bytes) -> Json<TagResponse> {
    let source = match parse_request(&body) {
        Ok(source) => source,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return Json(TagResponse::failed(&e));
        }
    };
    debug!("Tagging {} bytes of text", source.len());

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || pipeline.tag(&source))
        .await
        .unwrap_or_else(|e| Err(TaggerError::InferenceError(format!("worker failed: {}", e))));

    match result {
        Ok(tags) => {
            debug!("Produced {} tags", tags.len());
            Json(TagResponse::succeeded(&tags))
        }
        Err(e) => {
            warn!("Tagging failed: {}", e);
            Json(TagResponse::failed(&e))
        }
    }
}

/// Health endpoint: runs the canary through the full pipeline.
///
/// Failure details are logged, never returned.
pub async fn health_handler(State(state): State<Arc<HandlerState>>) -> Json<HealthResponse> {
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || pipeline.health_check())
        .await
        .unwrap_or_else(|e| Err(TaggerError::HealthCheckError(format!("worker failed: {}", e))));

    match result {
        Ok(()) => Json(HealthResponse { health: "true" }),
        Err(e) => {
            error!("Health check failed with error {}", e);
            Json(HealthResponse { health: "false" })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("  Cats are pets.\nDogs too.\n"), "Cats are pets. Dogs too.");
        assert_eq!(normalize_source("\n\n"), "");
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request(br#"{"source": "a\nb "}"#).unwrap(), "a b");

        for body in [&b"{}"[..], br#"{"source": 3}"#, b"not json", b""] {
            let err = parse_request(body).unwrap_err();
            assert!(matches!(err, TaggerError::MalformedInput(_)));
            assert!(err.to_string().starts_with("Malformed input: "));
        }
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_value(TagResponse::succeeded(&["Cats".into(), "Dogs".into()])).unwrap();
        assert_eq!(ok, serde_json::json!({"success": "true", "tags": "Cats;Dogs"}));

        let empty = serde_json::to_value(TagResponse::succeeded(&[])).unwrap();
        assert_eq!(empty, serde_json::json!({"success": "true", "tags": ""}));

        let failed = TagResponse::failed(&TaggerError::InferenceError("boom".into()));
        assert_eq!(
            serde_json::to_value(failed).unwrap(),
            serde_json::json!({"success": "false", "error": "Failed to predict: boom"})
        );
    }
}
