use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{message}")]
    MissingFileError { message: String },

    #[error("{message}")]
    InvalidRequestError { message: String },

    #[error("Uploaded file exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge { limit_bytes: usize },

    #[error("{context}: {details}")]
    UpstreamError { context: String, details: String },

    #[error("Model API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    ModelStatusError { status: u16, body: String },

    #[error("Model response contained no text")]
    EmptyModelResponse,

    #[error("failed to parse response")]
    ParseError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Upstream,
    Decode,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn missing_file(message: impl Into<String>) -> Self {
        Self::MissingFileError {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequestError {
            message: message.into(),
        }
    }

    /// 把模型呼叫的錯誤包裝成帶有階段說明的上游錯誤
    pub fn upstream(context: impl Into<String>, err: RelayError) -> Self {
        let details = match err {
            RelayError::UpstreamError { details, .. } => details,
            other => other.to_string(),
        };
        Self::UpstreamError {
            context: context.into(),
            details,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingFileError { .. }
            | Self::InvalidRequestError { .. }
            | Self::PayloadTooLarge { .. } => ErrorCategory::Input,
            Self::UpstreamError { .. }
            | Self::ApiError(_)
            | Self::ModelStatusError { .. }
            | Self::EmptyModelResponse => ErrorCategory::Upstream,
            Self::ParseError => ErrorCategory::Decode,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Upstream | ErrorCategory::Decode => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 只有連線層級的失敗、429 與 5xx 值得重試
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ModelStatusError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFileError { .. } | Self::InvalidRequestError { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingFileError { message } | Self::InvalidRequestError { message } => {
                message.clone()
            }
            Self::PayloadTooLarge { limit_bytes } => {
                format!("The uploaded file is too large (limit {} bytes)", limit_bytes)
            }
            Self::UpstreamError { context, .. } => context.clone(),
            Self::ApiError(_) | Self::ModelStatusError { .. } | Self::EmptyModelResponse => {
                "The language model service could not be reached".to_string()
            }
            Self::ParseError => "failed to parse response".to_string(),
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => format!("Configuration problem: {}", self),
            Self::IoError(_) | Self::SerializationError(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check the request payload and try again",
            ErrorCategory::Upstream => {
                "Check network access, the API key and the model quota, then retry"
            }
            ErrorCategory::Decode => "Retry the request; the model returned unstructured output",
            ErrorCategory::Configuration => {
                "Set GEMINI_API_KEY or fix the configuration file, then restart"
            }
            ErrorCategory::System => "Inspect the server logs for details",
        }
    }

    /// 上游錯誤會附帶細節，方便內部工具除錯
    fn details(&self) -> Option<String> {
        match self {
            Self::UpstreamError { details, .. } => Some(details.clone()),
            Self::ApiError(_) | Self::ModelStatusError { .. } | Self::EmptyModelResponse => {
                Some(self.to_string())
            }
            _ => None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({ "error": self.user_friendly_message() });
        if let Some(details) = self.details() {
            body["details"] = serde_json::Value::String(details);
        }
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
