//! HTTP error mapping
//!
//! Every failure the adapter reports becomes an [`ApiError`] with a status
//! code and a JSON body of the form
//! `{"error": {"code", "message", "rule"?, "attachment"?, "field"?}}`.

use infodoc_composition::{MergeError, MergeErrorKind};
use infodoc_store::{ReplaceError, StoreError};
use serde::Serialize;
use warp::http::StatusCode;

/// Failure reported to an HTTP client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown resource or route
    #[error("{0}")]
    NotFound(String),

    /// Replace payload rejected
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// `If-Match` names a stale or unknown revision
    #[error("{0}")]
    Conflict(String),

    /// Declared body length above the ceiling
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Body sent without a `Content-Length`
    #[error("a Content-Length header is required")]
    LengthRequired,

    /// Route exists but not for this method
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Storage failure
    #[error(transparent)]
    Store(StoreError),

    /// Any other unexpected failure
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Merge(err) => match err.kind() {
                MergeErrorKind::MalformedPayload => StatusCode::BAD_REQUEST,
                MergeErrorKind::MissingField
                | MergeErrorKind::MalformedEncoding
                | MergeErrorKind::DuplicateIdentifier => StatusCode::UNPROCESSABLE_ENTITY,
                MergeErrorKind::SizeLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            },
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Merge(err) => err.kind().code(),
            Self::Conflict(_) => "conflict",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::LengthRequired => "length_required",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Store(_) | Self::Internal(_) => "internal",
        }
    }

    /// JSON body
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            // Details stay in the logs.
            Self::Store(_) | Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let mut detail = ErrorDetail {
            code: self.code(),
            message,
            rule: None,
            attachment: None,
            field: None,
        };
        if let Self::Merge(err) = self {
            match err {
                MergeError::MalformedPayload { field, .. } => detail.field.clone_from(field),
                MergeError::Attachment(err) => {
                    let locator = err.locator();
                    detail.rule = Some(err.rule().as_str());
                    detail.attachment = Some(AttachmentRef {
                        index: locator.index,
                        id: locator.id.clone(),
                    });
                    detail.field = err.field().map(str::to_string);
                }
            }
        }
        ErrorBody { error: detail }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict { .. } | StoreError::AlreadyExists { .. } => {
                Self::Conflict(err.to_string())
            }
            other => Self::Store(other),
        }
    }
}

impl From<ReplaceError<MergeError>> for ApiError {
    fn from(err: ReplaceError<MergeError>) -> Self {
        match err {
            ReplaceError::Store(err) => err.into(),
            ReplaceError::Rejected(err) => Self::Merge(err),
        }
    }
}

/// Error response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error detail
    pub error: ErrorDetail,
}

/// Error response detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Attachment rule that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'static str>,
    /// Offending attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    /// Offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Position of the offending attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    /// Zero-based index in `documents`
    pub index: usize,
    /// Attachment id, when readable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
