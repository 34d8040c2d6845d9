use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::extractors::ExtractError;
use crate::repositories::store::StoreError;
use crate::services::handshake::HandshakeError;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The portal rejected the submitted credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The caller has no session, or the portal no longer accepts it.
    #[error("Unauthorized")]
    Unauthorized,

    /// A request parameter is missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transport error talking to the portal.
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The login flow broke for a reason other than bad credentials.
    #[error("Handshake error: {0}")]
    Handshake(HandshakeError),

    /// A portal page did not have the expected shape.
    #[error("Markup error: {0}")]
    Markup(String),

    /// The session store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<HandshakeError> for AppError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Rejected(message) => AppError::Authentication(message),
            HandshakeError::Transport(e) => AppError::Upstream(e),
            other => AppError::Handshake(other),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Expired => AppError::Unauthorized,
            ExtractError::Markup(message) => AppError::Markup(message),
        }
    }
}

impl AppError {
    /// Whether this error is an infrastructure failure that is safe to retry.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(
            self,
            AppError::Authentication(_) | AppError::Unauthorized | AppError::Validation(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::debug!("Session rejected");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Upstream(ref e) => {
                tracing::error!("Upstream error: {}", e);
                (StatusCode::BAD_GATEWAY, "Portal unavailable".to_string())
            }

            AppError::Handshake(ref e) => {
                tracing::error!("Handshake error: {}", e);
                (StatusCode::BAD_GATEWAY, "Portal login failed".to_string())
            }

            AppError::Markup(ref msg) => {
                tracing::error!("Markup error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Unexpected portal response".to_string())
            }

            AppError::Store(ref e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Serialization(ref msg) => {
                tracing::error!("Serialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
