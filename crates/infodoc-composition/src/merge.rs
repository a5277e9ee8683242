//! Replace-merge engine
//!
//! [`MergeEngine::merge`] builds the candidate resource for a replace from
//! the stored resource and an inbound JSON payload. It performs no I/O and
//! either returns a fully validated candidate or the first violation found;
//! the stored resource is never touched.

use crate::policy::FieldPolicy;
use infodoc_artifact::resource::DOCUMENTS_KEY;
use infodoc_artifact::{
    validate, Attachment, AttachmentError, Resource, SizeBudget, SizeLimits, ValidatedAttachment,
};
use serde_json::{Map, Value};

/// Merge engine configuration
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    policy: FieldPolicy,
    limits: SizeLimits,
}

impl MergeEngine {
    /// Engine with the default policy and limits
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server-owned field policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the size limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Field policy in force
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &FieldPolicy {
        &self.policy
    }

    /// Size limits in force
    #[inline]
    #[must_use]
    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Parse a raw body and merge it
    ///
    /// # Errors
    /// Returns [`MergeError::MalformedPayload`] if the body is not JSON, or
    /// any error [`MergeEngine::merge`] returns
    pub fn merge_slice(&self, stored: &Resource, body: &[u8]) -> Result<Merged, MergeError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| MergeError::malformed(format!("body is not valid JSON: {e}")))?;
        self.merge(stored, payload)
    }

    /// Merge an inbound payload over a stored resource
    ///
    /// Every non-denied top-level key overwrites the stored field; stored
    /// fields absent from the payload are kept. `documents` is replaced
    /// wholesale by the validated inbound list (absent or `null` means
    /// empty).
    ///
    /// # Errors
    /// Returns the first violation: a non-object payload, a non-array
    /// `documents`, or the first attachment that fails validation
    pub fn merge(&self, stored: &Resource, payload: Value) -> Result<Merged, MergeError> {
        let Value::Object(payload) = payload else {
            return Err(MergeError::malformed(format!(
                "payload must be a JSON object, got {}",
                json_type_name(&payload)
            )));
        };

        let (mut writable, stripped) = self.policy.partition(payload);
        if !stripped.is_empty() {
            tracing::debug!(resource = %stored.id(), keys = ?stripped, "stripped server-owned keys");
        }

        let raw_documents = writable.shift_remove(DOCUMENTS_KEY).unwrap_or(Value::Null);
        let entries = match raw_documents {
            Value::Null => Vec::new(),
            Value::Array(entries) => entries,
            other => {
                return Err(MergeError::MalformedPayload {
                    reason: format!("`documents` must be an array, got {}", json_type_name(&other)),
                    field: Some(DOCUMENTS_KEY.to_string()),
                })
            }
        };

        let mut budget = SizeBudget::new(self.limits);
        let documents = entries
            .iter()
            .enumerate()
            .map(|(index, raw)| validate(index, raw, &mut budget).map(ValidatedAttachment::into_attachment))
            .collect::<Result<Vec<Attachment>, _>>()?;

        let mut fields: Map<String, Value> = stored.fields().clone();
        for (key, value) in writable {
            fields.insert(key, value);
        }

        let resource = Resource::from_parts(stored.id().clone(), fields, documents);
        tracing::debug!(
            resource = %resource.id(),
            documents = resource.documents().len(),
            decoded_bytes = budget.used_bytes(),
            "merged payload"
        );
        Ok(Merged {
            resource,
            stripped,
            decoded_bytes: budget.used_bytes(),
        })
    }
}

/// Successful merge
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Candidate resource
    pub resource: Resource,
    /// Server-owned keys removed from the payload
    pub stripped: Vec<String>,
    /// Total decoded attachment bytes
    pub decoded_bytes: usize,
}

impl Merged {
    /// Unwrap the candidate resource
    #[inline]
    #[must_use]
    pub fn into_resource(self) -> Resource {
        self.resource
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reason a replace was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Payload is not a JSON object or a top-level field has the wrong shape
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// What was wrong
        reason: String,
        /// Offending top-level key
        field: Option<String>,
    },

    /// An attachment failed validation
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

impl MergeError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            field: None,
        }
    }

    /// Error category
    #[must_use]
    pub fn kind(&self) -> MergeErrorKind {
        match self {
            Self::MalformedPayload { .. }
            | Self::Attachment(
                AttachmentError::NotAnObject { .. } | AttachmentError::WrongType { .. },
            ) => MergeErrorKind::MalformedPayload,
            Self::Attachment(AttachmentError::MissingField { .. }) => MergeErrorKind::MissingField,
            Self::Attachment(AttachmentError::MalformedEncoding { .. }) => {
                MergeErrorKind::MalformedEncoding
            }
            Self::Attachment(AttachmentError::SizeLimitExceeded { .. }) => {
                MergeErrorKind::SizeLimitExceeded
            }
            Self::Attachment(AttachmentError::DuplicateIdentifier { .. }) => {
                MergeErrorKind::DuplicateIdentifier
            }
        }
    }

    /// Attachment error, if the failure was attachment-level
    #[must_use]
    pub fn attachment(&self) -> Option<&AttachmentError> {
        match self {
            Self::Attachment(err) => Some(err),
            Self::MalformedPayload { .. } => None,
        }
    }
}

/// Category of a [`MergeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeErrorKind {
    /// Unparseable or mis-shaped payload
    MalformedPayload,
    /// Required attachment field missing
    MissingField,
    /// Attachment `fileUrl` is not a base64 data URI
    MalformedEncoding,
    /// Attachment content over a ceiling
    SizeLimitExceeded,
    /// Attachment id reused within the set
    DuplicateIdentifier,
}

impl MergeErrorKind {
    /// Stable snake_case code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::MissingField => "missing_field",
            Self::MalformedEncoding => "malformed_encoding",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::DuplicateIdentifier => "duplicate_identifier",
        }
    }
}
