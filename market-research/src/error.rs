use axum::http::StatusCode;
use market_research_sdk::{CapabilityError, ValidationError};
use thiserror::Error;

/// Failure kinds surfaced by the gateway, the generator and the router
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Missing API key")]
    MissingCredential,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    External(#[from] CapabilityError),
    #[error("capability '{capability}' returned malformed output: {reason}")]
    MalformedResult { capability: String, reason: String },
}

impl Error {
    pub fn malformed(capability: &str, reason: impl ToString) -> Self {
        Self::MalformedResult {
            capability: capability.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::External(_) | Self::MalformedResult { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::MissingCredential => "missing_credential",
            Self::NotFound(_) => "not_found",
            Self::External(_) => "external_failure",
            Self::MalformedResult { .. } => "malformed_result",
        }
    }

    /// Whether the message is safe and useful to show to the caller as-is
    pub fn is_caller_facing(&self) -> bool {
        !matches!(self, Self::External(_) | Self::MalformedResult { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
