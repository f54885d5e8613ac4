//! Error taxonomy for the dispatch pipeline.
//!
//! Precondition failures are fatal to the whole invocation and carry an
//! HTTP status class; per-recipient send failures never appear here,
//! they live in the per-lead results of the dispatch report.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed or missing required request fields.
    #[error("{0}")]
    InvalidInput(String),

    /// No resolvable caller identity.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller's organization does not own the referenced resource.
    #[error("{0}")]
    Forbidden(String),

    /// Referenced template/account/campaign does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Secret material could not be resolved for the account.
    #[error("{0}")]
    CredentialUnavailable(String),

    #[error("no leads to send")]
    NoEligibleLeads,

    /// SMTP transport could not be built, or a test send was refused.
    #[error("{0}")]
    Smtp(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::InvalidInput(_)
            | DispatchError::CredentialUnavailable(_)
            | DispatchError::NoEligibleLeads
            | DispatchError::Smtp(_) => StatusCode::BAD_REQUEST,
            DispatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            DispatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DispatchError::InvalidInput("missing campaign_id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(DispatchError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            DispatchError::Forbidden("forbidden account".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DispatchError::NotFound("template not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(DispatchError::NoEligibleLeads.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DispatchError::Store(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        assert_eq!(DispatchError::NoEligibleLeads.to_string(), "no leads to send");
        assert_eq!(
            DispatchError::CredentialUnavailable(
                "no decrypted SMTP password available".into()
            )
            .to_string(),
            "no decrypted SMTP password available"
        );
    }
}
