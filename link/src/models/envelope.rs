use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::field_error::FieldError;

/// Uniform wrapper the backend puts around every successful response.
///
/// `data` is kept as raw JSON here; the client decodes it into the caller's
/// payload type after checking `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T = JsonValue> {
    pub success: bool,

    #[serde(default)]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Failure variant of the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,

    /// Machine-readable error code, e.g. `VALIDATION_ERROR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Field-level validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
