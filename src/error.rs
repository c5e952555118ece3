//! Gateway error taxonomy and its HTTP mapping.
//!
//! Every failure on the request path is a `GatewayError`. Errors are terminal:
//! the gateway never retries, the caller does.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Artifact families served from the proof-of-weights directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `{block}_{hotkey}_{uid}.json`
    Proof,
    /// `receipts/{transaction_hash}`
    Receipt,
    /// `{transaction_hash}.json`
    ProofOfWeights,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{}", not_found_detail(.0))]
    NotFound(ArtifactKind),

    #[error("Signature or input error: {0}")]
    InvalidInput(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Sender is not a validator on claimed network")]
    UnauthorizedSender,

    #[error("Failed to submit inputs: {0}")]
    ForwardingFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn not_found_detail(kind: &ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Receipt => "Receipt file not found",
        ArtifactKind::Proof | ArtifactKind::ProofOfWeights => "File not found",
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidInput(_)
            | GatewayError::InvalidSignature
            | GatewayError::UnauthorizedSender
            | GatewayError::ForwardingFailed(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short reason sent in the `X-Error` response header
    pub fn x_error(&self) -> &'static str {
        match self {
            GatewayError::NotFound(ArtifactKind::Receipt) => "Receipt not found",
            GatewayError::NotFound(_) => "Such proof does not exist",
            GatewayError::InvalidInput(_) => "Signature or input error",
            GatewayError::InvalidSignature => "Invalid signature",
            GatewayError::UnauthorizedSender => "Invalid sender",
            GatewayError::ForwardingFailed(_) => "Failed to submit inputs",
            GatewayError::Internal(_) => "Internal error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let detail = match &self {
            // Never echo filesystem details back to the caller
            GatewayError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (
            self.status_code(),
            [("x-error", self.x_error())],
            Json(serde_json::json!({ "detail": detail })),
        )
            .into_response()
    }
}
