use reqwest::StatusCode;
use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{0}")]
    Network(String),
    #[error("{message}")]
    Validation { status: u16, message: String },
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("unexpected response from server: {0}")]
    Decode(String),
    #[error("invalid API url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Builds the error for a non-success response, preferring the message
    /// from the API's JSON error body over the raw body text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ApiError>(body)
            .map(|err| err.message)
            .ok()
            .filter(|message| !message.trim().is_empty())
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        if status.is_server_error() {
            Self::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Validation {
                status: status.as_u16(),
                message,
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_response(status, "");
        }
        if err.is_builder() {
            return Self::InvalidUrl(err.to_string());
        }
        Self::Network(format!("failed to reach inventory API: {err}"))
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
