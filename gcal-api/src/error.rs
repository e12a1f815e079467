use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum CalendarApiError {
    Google(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl CalendarApiError {
    /// HTTP status of a provider-side failure, `None` for transport errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CalendarApiError::Google(status, _) => Some(*status),
            CalendarApiError::Internal(_) => None,
        }
    }
}

impl From<ApiError> for CalendarApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                CalendarApiError::Google(status, ErrorDetail::parse(&detail))
            }
            e => CalendarApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for CalendarApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarApiError::Internal(e) => write!(f, "Internal error: {}", e),
            CalendarApiError::Google(status, detail) => match &detail.status {
                Some(name) => write!(f, "({}) {}: {}", status, name, detail.message),
                None => write!(f, "({}) {}", status, detail.message),
            },
        }
    }
}

impl std::error::Error for CalendarApiError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Body of a failed Calendar API call.
///
/// Google answers with `{"error": {"code", "message", "errors", "status"}}`
/// for API calls, but gateways and the OAuth layer in front of it may answer
/// with `{"error": "invalid_grant", "error_description": ...}` or plain text.
/// All three shapes collapse into this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl ErrorDetail {
    pub fn parse(body: &str) -> Self {
        if let Ok(response) = serde_json::from_str::<ErrorResponse>(body) {
            return response.error;
        }

        if let Ok(oauth) = serde_json::from_str::<OAuthErrorResponse>(body) {
            return Self {
                message: oauth.error_description.unwrap_or_else(|| oauth.error.clone()),
                status: Some(oauth.error),
                ..Self::default()
            };
        }

        Self {
            message: body.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().filter_map(|item| item.reason.as_deref())
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons().any(|r| r == reason)
    }
}
