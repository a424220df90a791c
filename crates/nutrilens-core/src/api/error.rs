use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Could not connect to the server.")]
    Connection(#[from] reqwest::Error),

    #[error("Incorrect email or password.")]
    InvalidCredentials,

    #[error("Your session has expired. Please log in again.")]
    Unauthorized,

    #[error("You must be logged in to {0}.")]
    NotLoggedIn(&'static str),

    /// The backend refused the request; `detail` is shown verbatim.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Unsupported image type '{0}' (use PNG, JPG, or WEBP)")]
    UnsupportedImage(String),

    #[error("Could not read image: {0}")]
    ImageRead(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// The four ways a request can fail, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Authentication,
    Rejected,
    Local,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull FastAPI-style `{"detail": ...}` out of an error body.
    /// String details come back verbatim; structured ones as compact JSON.
    pub fn extract_detail(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get("detail")? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Map a non-2xx response. `fallback` is used when the body has no detail.
    pub fn from_status(status: reqwest::StatusCode, body: &str, fallback: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            code => ApiError::Rejected {
                status: code,
                detail: Self::extract_detail(body).unwrap_or_else(|| fallback.to_string()),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Connection(_) => ErrorKind::Network,
            ApiError::InvalidCredentials | ApiError::Unauthorized | ApiError::NotLoggedIn(_) => {
                ErrorKind::Authentication
            }
            ApiError::Rejected { .. } | ApiError::InvalidResponse(_) => ErrorKind::Rejected,
            ApiError::UnsupportedImage(_) | ApiError::ImageRead(_) => ErrorKind::Local,
        }
    }

    /// True when the held token should be dropped locally.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
