use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    RateLimited,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorCode::NotFound,
            400 | 413 | 415 | 422 => ErrorCode::Validation,
            409 => ErrorCode::Conflict,
            429 => ErrorCode::RateLimited,
            502..=504 => ErrorCode::Unavailable,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error payload the backend attaches to non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Flattens `detail` into a single line; validation errors arrive as a
    /// list of objects with a `msg` field.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(|m| m.as_str()) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                Some(parts.join("; "))
            }
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?} ({status}): {message}")]
pub struct ApiException {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: ErrorCode::from_status(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(422), ErrorCode::Validation);
        assert_eq!(ErrorCode::from_status(503), ErrorCode::Unavailable);
        assert_eq!(ErrorCode::from_status(500), ErrorCode::Internal);
    }

    #[test]
    fn exception_keeps_status_and_classifies_it() {
        let err = ApiException::new(404, "Scan not found");
        assert_eq!(err.status, 404);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NotFound (404): Scan not found");
        assert!(!ApiException::new(422, "bad").is_not_found());
    }

    #[test]
    fn flattens_validation_detail_lists() {
        let body: ApiErrorBody = serde_json::from_value(serde_json::json!({
            "detail": [{"msg": "field required"}, {"msg": "too large"}]
        }))
        .expect("parse body");
        assert_eq!(body.message().as_deref(), Some("field required; too large"));
    }

    #[test]
    fn plain_detail_string_is_kept() {
        let body: ApiErrorBody =
            serde_json::from_value(serde_json::json!({ "detail": "Scan not found" }))
                .expect("parse body");
        assert_eq!(body.message().as_deref(), Some("Scan not found"));
    }
}
