use serde::{Deserialize, Serialize};

/// The JSON body the service sends with a failed request, or inside a stream that failed
/// after it started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Details of an [`ApiErrorBody`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,

    /// Error category, e.g. `invalid_request_error`.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,

    /// The offending parameter, if any.
    #[serde(default)]
    pub param: Option<String>,

    /// Machine-readable code, e.g. `rate_limit_exceeded`.
    #[serde(default)]
    pub code: Option<String>,
}
