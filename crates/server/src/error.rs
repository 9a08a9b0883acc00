use core::fmt::{self, Display, Formatter};
use std::error::Error;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use metashare_sync::SyncError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    pub(crate) status_code: StatusCode,
    pub(crate) message: String,
    /// Whether to tell the caller how to authenticate.
    pub(crate) challenge: bool,
}

impl ApiError {
    pub(crate) fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            challenge: false,
        }
    }

    /// Like [`ApiError::new`], with a `WWW-Authenticate` hint attached.
    pub(crate) fn challenge(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            challenge: true,
            ..Self::new(status_code, message)
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)
    }
}

impl Error for ApiError {}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status_code = match &err {
            SyncError::ProtocolNotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            SyncError::NotAvailable(_) | SyncError::Forbidden => StatusCode::FORBIDDEN,
            SyncError::UnknownObject(_) => StatusCode::NOT_FOUND,
            _ => {
                error!(%err, "Sync request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self::new(status_code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status_code, Json(json!({ "error": self.message }))).into_response();

        if self.challenge {
            let _ignored = response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"metashare-sync\""),
            );
        }

        response
    }
}
