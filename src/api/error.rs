//! Mapping of library errors onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;
use crate::upload::UploadError;

/// JSON error body: `{"error": "..."}`, plus `orphanedUrl` when a blob was
/// stored without an entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned_url: Option<String>,
}

/// Handler error.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub orphaned_url: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            orphaned_url: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => Self::bad_request(msg),
            StoreError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Entry store unavailable");
                Self::internal(format!("storage unavailable: {msg}"))
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        let status = match &e {
            UploadError::Input(_) | UploadError::Validation(_) => StatusCode::BAD_REQUEST,
            UploadError::Upload(_) => StatusCode::BAD_GATEWAY,
            UploadError::StorageUnavailable(_) | UploadError::MetadataCommitFailedAfterUpload { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            message: e.to_string(),
            orphaned_url: e.orphaned_url().map(str::to_string),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            orphaned_url: self.orphaned_url,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobError;

    #[test]
    fn test_upload_error_status_codes() {
        let cases = [
            (UploadError::Input("no image source".into()), StatusCode::BAD_REQUEST),
            (UploadError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (
                UploadError::Upload(BlobError::Rejected("full".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                UploadError::StorageUnavailable("locked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_orphaned_url_carried() {
        let err = ApiError::from(UploadError::MetadataCommitFailedAfterUpload {
            url: "https://blobs.example/a.png".into(),
            source: StoreError::Unavailable("locked".into()),
        });

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.orphaned_url.as_deref(), Some("https://blobs.example/a.png"));
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "imageRef is required".into(),
            orphaned_url: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "imageRef is required"})
        );
    }
}
