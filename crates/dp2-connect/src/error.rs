//! Error types for the dp2-connect crate

use dp2_core_interface::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ConnectError> for ApiError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Http(e) if e.is_decode() => ApiError::Decode(e.to_string()),
            ConnectError::Http(e) => ApiError::Transport(e.to_string()),
            ConnectError::InvalidUrl(e) => ApiError::Transport(format!("invalid service URL: {}", e)),
            ConnectError::Status { status, body } => match status {
                401 | 403 => ApiError::Unauthorized(body),
                404 => ApiError::NotFound(body),
                _ => ApiError::Remote {
                    status,
                    message: body,
                },
            },
            ConnectError::Decode(e) => ApiError::Decode(e.to_string()),
        }
    }
}
