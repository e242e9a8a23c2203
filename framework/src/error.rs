use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::campaign::{ContactError, StoreError};
use crate::mail::MailError;

/// Errors that abort an invocation.
///
/// Delivery and bookkeeping problems during a send do not show up here; they
/// are part of the dispatch report. Running out of contacts is the
/// `completed` outcome, not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable mail credentials.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The contact list is missing or unreadable.
    #[error("contact list unavailable: {0}")]
    DataSource(#[from] ContactError),

    /// The mail transport could not be set up.
    #[error(transparent)]
    Delivery(#[from] MailError),

    #[error("bookkeeping failed: {0}")]
    Bookkeeping(#[source] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn http_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DataSource(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::Bookkeeping(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a caller.
    pub fn http_message(&self) -> String {
        match self {
            Self::Configuration(msg) => msg.clone(),
            Self::DataSource(e) => e.to_string(),
            Self::Delivery(_) => "mail transport unavailable".to_string(),
            Self::Bookkeeping(_) => "failed to update campaign state".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.http_code();
        // Trace server errors since we don't return the detailed error in the response body
        if code.is_server_error() {
            tracing::error!("Error Status {}: {}", code, self);
        }

        let mut body = jsend::ErrorResponse::new(&self.http_message());
        body.code = Some(code.as_u16());
        (code, Json(body)).into_response()
    }
}

/// JSend error response
///
/// <https://github.com/omniti-labs/jsend>
pub mod jsend {
    use serde_json::Value;

    #[derive(Debug, serde::Serialize)]
    pub struct ErrorResponse {
        status: &'static str,
        pub message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub data: Option<Value>,
    }

    impl ErrorResponse {
        pub fn new(message: &str) -> Self {
            ErrorResponse {
                status: "error",
                message: message.into(),
                code: None,
                data: None,
            }
        }
    }
}
