//! Attachment model and validator
//!
//! An [`Attachment`] is a document record embedded in a resource, carrying
//! its content inline as a data URI. [`validate`] turns one raw JSON entry
//! of an inbound `documents` array into a [`ValidatedAttachment`], charging
//! its decoded size against a running [`SizeBudget`].
//!
//! Checks run in a fixed order:
//! 1. required fields (`id`, `fileName`, `fileUrl`)
//! 2. `fileUrl` data URI grammar
//! 3. decoded size against the per-attachment and aggregate ceilings
//! 4. `id` uniqueness within the new `documents` set

use crate::datauri::{CodecError, DataUriRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Default per-attachment ceiling on decoded content (5 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Default ceiling on the decoded content of all attachments of one resource (32 MiB)
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 32 * 1024 * 1024;

/// Attachment wire field names
pub mod field {
    /// Caller-supplied identifier
    pub const ID: &str = "id";
    /// Display label
    pub const NAME: &str = "name";
    /// Opaque date string
    pub const DATE: &str = "date";
    /// Original file name
    pub const FILE_NAME: &str = "fileName";
    /// Inline content as a data URI
    pub const FILE_URL: &str = "fileUrl";
}

/// Document record embedded in a resource
///
/// Keys other than the five known fields are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Caller-supplied identifier, unique within the parent resource
    pub id: String,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Caller-supplied date, never parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Original file name, preserved byte-for-byte
    pub file_name: String,
    /// `data:<mime>;base64,<payload>`
    pub file_url: String,
    /// Unknown keys, passed through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attachment {
    /// Create an attachment with the required fields
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            date: None,
            file_name: file_name.into(),
            file_url: file_url.into(),
            extra: Map::new(),
        }
    }

    /// Set display label
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set date string
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Mime type declared by the data URI, if it parses
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        DataUriRef::split(&self.file_url)
            .ok()
            .map(|envelope| envelope.mime_type())
    }

    /// Decode the inline content
    ///
    /// # Errors
    /// Returns error if `fileUrl` is not a valid data URI
    pub fn decode_content(&self) -> Result<Vec<u8>, CodecError> {
        DataUriRef::split(&self.file_url)?.decode()
    }

    /// Convert to the JSON object form used on the wire
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(field::ID.into(), Value::String(self.id.clone()));
        if let Some(name) = &self.name {
            map.insert(field::NAME.into(), Value::String(name.clone()));
        }
        if let Some(date) = &self.date {
            map.insert(field::DATE.into(), Value::String(date.clone()));
        }
        map.insert(field::FILE_NAME.into(), Value::String(self.file_name.clone()));
        map.insert(field::FILE_URL.into(), Value::String(self.file_url.clone()));
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Size ceilings applied to embedded content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeLimits {
    /// Ceiling on one attachment's decoded bytes
    pub max_attachment_bytes: usize,
    /// Ceiling on the decoded bytes of all attachments of a resource
    pub max_total_bytes: usize,
}

impl SizeLimits {
    /// Create limits
    #[inline]
    #[must_use]
    pub const fn new(max_attachment_bytes: usize, max_total_bytes: usize) -> Self {
        Self {
            max_attachment_bytes,
            max_total_bytes,
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_MAX_TOTAL_BYTES)
    }
}

/// Running budget for one `documents` set
///
/// Tracks accepted ids (with their index) and the decoded bytes charged so
/// far. A rejected attachment charges nothing.
#[derive(Debug, Clone)]
pub struct SizeBudget {
    limits: SizeLimits,
    used_bytes: usize,
    seen_ids: HashMap<String, usize>,
}

impl SizeBudget {
    /// Fresh budget for the given limits
    #[must_use]
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            limits,
            used_bytes: 0,
            seen_ids: HashMap::new(),
        }
    }

    /// Limits in force
    #[inline]
    #[must_use]
    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Decoded bytes charged so far
    #[inline]
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Bytes still available under the aggregate ceiling
    #[inline]
    #[must_use]
    pub fn remaining_bytes(&self) -> usize {
        self.limits.max_total_bytes.saturating_sub(self.used_bytes)
    }

    /// Number of attachments accepted
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.seen_ids.len()
    }

    fn check_size(&self, locator: &AttachmentLocator, decoded_len: usize) -> Result<(), AttachmentError> {
        if decoded_len > self.limits.max_attachment_bytes {
            return Err(AttachmentError::SizeLimitExceeded {
                locator: locator.clone(),
                scope: SizeScope::Attachment,
                size: decoded_len,
                limit: self.limits.max_attachment_bytes,
            });
        }
        if decoded_len > self.remaining_bytes() {
            return Err(AttachmentError::SizeLimitExceeded {
                locator: locator.clone(),
                scope: SizeScope::Aggregate,
                size: self.used_bytes.saturating_add(decoded_len),
                limit: self.limits.max_total_bytes,
            });
        }
        Ok(())
    }

    fn commit(&mut self, id: &str, index: usize, decoded_len: usize) {
        self.used_bytes += decoded_len;
        self.seen_ids.insert(id.to_string(), index);
    }
}

/// Attachment that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAttachment {
    attachment: Attachment,
    decoded_len: usize,
}

impl ValidatedAttachment {
    /// The accepted attachment
    #[inline]
    #[must_use]
    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    /// Decoded content length in bytes
    #[inline]
    #[must_use]
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Unwrap the attachment
    #[inline]
    #[must_use]
    pub fn into_attachment(self) -> Attachment {
        self.attachment
    }
}

/// Validate one raw `documents` entry against the running budget
///
/// On success the entry's id and decoded size are charged to `budget`.
///
/// # Errors
/// Returns the first rule the entry violates, located by index and id
pub fn validate(
    index: usize,
    raw: &Value,
    budget: &mut SizeBudget,
) -> Result<ValidatedAttachment, AttachmentError> {
    let mut locator = AttachmentLocator::new(index);
    let Value::Object(object) = raw else {
        return Err(AttachmentError::NotAnObject { locator });
    };

    let id = required_str(object, field::ID, &locator)?;
    locator.id = id.clone();
    let id = match id {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(AttachmentError::MissingField {
                locator,
                field: field::ID,
            })
        }
    };
    let file_name = required_str(object, field::FILE_NAME, &locator)?.ok_or_else(|| {
        AttachmentError::MissingField {
            locator: locator.clone(),
            field: field::FILE_NAME,
        }
    })?;
    let file_url = required_str(object, field::FILE_URL, &locator)?.ok_or_else(|| {
        AttachmentError::MissingField {
            locator: locator.clone(),
            field: field::FILE_URL,
        }
    })?;
    let name = required_str(object, field::NAME, &locator)?;
    let date = required_str(object, field::DATE, &locator)?;

    let envelope = DataUriRef::split(&file_url).map_err(|source| {
        AttachmentError::MalformedEncoding {
            locator: locator.clone(),
            source,
        }
    })?;
    let declared_len = envelope.decoded_len().map_err(|source| {
        AttachmentError::MalformedEncoding {
            locator: locator.clone(),
            source,
        }
    })?;
    // Reject oversized content before spending time decoding it.
    budget.check_size(&locator, declared_len)?;
    let decoded_len = envelope
        .decode()
        .map_err(|source| AttachmentError::MalformedEncoding {
            locator: locator.clone(),
            source,
        })?
        .len();
    budget.check_size(&locator, decoded_len)?;

    if let Some(&first_index) = budget.seen_ids.get(&id) {
        return Err(AttachmentError::DuplicateIdentifier {
            locator,
            first_index,
        });
    }

    let extra = object
        .iter()
        .filter(|(key, _)| {
            ![field::ID, field::NAME, field::DATE, field::FILE_NAME, field::FILE_URL]
                .contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    budget.commit(&id, index, decoded_len);
    Ok(ValidatedAttachment {
        attachment: Attachment {
            id,
            name,
            date,
            file_name,
            file_url,
            extra,
        },
        decoded_len,
    })
}

/// Read an optional string field; `null` and absence are both `None`
fn required_str(
    object: &Map<String, Value>,
    key: &'static str,
    locator: &AttachmentLocator,
) -> Result<Option<String>, AttachmentError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AttachmentError::WrongType {
            locator: locator.clone(),
            field: key,
            expected: "a string",
        }),
    }
}

/// Position of an attachment in the inbound `documents` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentLocator {
    /// Zero-based index
    pub index: usize,
    /// Attachment id, when it could be read
    pub id: Option<String>,
}

impl AttachmentLocator {
    /// Locator with index only
    #[inline]
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self { index, id: None }
    }
}

impl Display for AttachmentLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "#{} (id {id:?})", self.index),
            None => write!(f, "#{}", self.index),
        }
    }
}

/// Which ceiling a size rejection refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeScope {
    /// Per-attachment ceiling
    Attachment,
    /// Aggregate ceiling across the resource
    Aggregate,
}

impl Display for SizeScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attachment => "per-attachment",
            Self::Aggregate => "aggregate",
        })
    }
}

/// Validation rule an attachment violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Entry must be an object with correctly typed fields
    Shape,
    /// `id`, `fileName` and `fileUrl` must be present
    RequiredFields,
    /// `fileUrl` must be a base64 data URI
    Encoding,
    /// Decoded content must fit the ceilings
    SizeLimit,
    /// `id` must be unique within the set
    UniqueId,
}

impl Rule {
    /// Stable rule name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::RequiredFields => "required_fields",
            Self::Encoding => "encoding",
            Self::SizeLimit => "size_limit",
            Self::UniqueId => "unique_id",
        }
    }
}

/// Reason an attachment was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    /// Entry is not a JSON object
    #[error("attachment {locator}: not a JSON object")]
    NotAnObject { locator: AttachmentLocator },

    /// Field present with the wrong JSON type
    #[error("attachment {locator}: field `{field}` must be {expected}")]
    WrongType {
        locator: AttachmentLocator,
        field: &'static str,
        expected: &'static str,
    },

    /// Required field absent, null, or (for `id`) empty
    #[error("attachment {locator}: missing required field `{field}`")]
    MissingField {
        locator: AttachmentLocator,
        field: &'static str,
    },

    /// `fileUrl` is not a valid data URI
    #[error("attachment {locator}: malformed fileUrl: {source}")]
    MalformedEncoding {
        locator: AttachmentLocator,
        #[source]
        source: CodecError,
    },

    /// Decoded content exceeds a ceiling
    #[error("attachment {locator}: {size} bytes exceeds the {scope} limit of {limit} bytes")]
    SizeLimitExceeded {
        locator: AttachmentLocator,
        scope: SizeScope,
        size: usize,
        limit: usize,
    },

    /// Another entry in the same set already uses this id
    #[error("attachment {locator}: id already used by attachment #{first_index}")]
    DuplicateIdentifier {
        locator: AttachmentLocator,
        first_index: usize,
    },
}

impl AttachmentError {
    /// Where the offending attachment sits
    #[must_use]
    pub fn locator(&self) -> &AttachmentLocator {
        match self {
            Self::NotAnObject { locator }
            | Self::WrongType { locator, .. }
            | Self::MissingField { locator, .. }
            | Self::MalformedEncoding { locator, .. }
            | Self::SizeLimitExceeded { locator, .. }
            | Self::DuplicateIdentifier { locator, .. } => locator,
        }
    }

    /// Rule that failed
    #[must_use]
    pub fn rule(&self) -> Rule {
        match self {
            Self::NotAnObject { .. } | Self::WrongType { .. } => Rule::Shape,
            Self::MissingField { .. } => Rule::RequiredFields,
            Self::MalformedEncoding { .. } => Rule::Encoding,
            Self::SizeLimitExceeded { .. } => Rule::SizeLimit,
            Self::DuplicateIdentifier { .. } => Rule::UniqueId,
        }
    }

    /// Offending field name, where one applies
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::WrongType { field, .. } | Self::MissingField { field, .. } => Some(field),
            Self::MalformedEncoding { .. } => Some(field::FILE_URL),
            Self::DuplicateIdentifier { .. } => Some(field::ID),
            _ => None,
        }
    }
}
