//! Resource model
//!
//! A [`Resource`] is addressed by a [`ResourceId`] and holds opaque fields
//! plus an ordered list of [`Attachment`]s. Fields keep their insertion
//! order so the representation mirrors what the client sent.

use crate::attachment::Attachment;
use crate::hash::{ContentHash, HashError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Identity key of a resource
pub const ID_KEY: &str = "id";

/// Key holding the attachment list
pub const DOCUMENTS_KEY: &str = "documents";

/// Opaque field from which `activeNews` is derived
pub const NEWS_KEY: &str = "news";

/// Derived read-only key listing active news entries
pub const ACTIVE_NEWS_KEY: &str = "activeNews";

/// JSON-LD framing keys added to every representation
pub const FRAMING_KEYS: [&str; 3] = ["@context", "@id", "@type"];

/// Keys computed by the server on read
pub const DERIVED_KEYS: [&str; 1] = [ACTIVE_NEWS_KEY];

/// Path prefix under which resources are addressed
pub const RESOURCE_PATH: &str = "/resource";

/// Default JSON-LD type name
pub const DEFAULT_RESOURCE_TYPE: &str = "GeneralInfo";

/// Resource identifier
///
/// Non-empty, at most 128 chars of ASCII alphanumerics, `-`, `_` or `.`,
/// not starting with `.`. Safe to use as a URL path segment and a file
/// stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Longest accepted identifier
    pub const MAX_LEN: usize = 128;

    /// Parse and validate an identifier
    ///
    /// # Errors
    /// Returns error if the identifier is empty, too long, or contains
    /// characters outside the allowed set
    pub fn new(id: impl Into<String>) -> Result<Self, ResourceIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ResourceIdError::Empty);
        }
        if id.len() > Self::MAX_LEN {
            return Err(ResourceIdError::TooLong {
                len: id.len(),
                max: Self::MAX_LEN,
            });
        }
        if id.starts_with('.')
            || id
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ResourceIdError::InvalidCharacters(id));
        }
        Ok(Self(id))
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `@id` IRI of the resource
    #[must_use]
    pub fn iri(&self) -> String {
        format!("{RESOURCE_PATH}/{}", self.0)
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Invalid resource identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceIdError {
    /// Empty identifier
    #[error("resource id is empty")]
    Empty,

    /// Identifier longer than [`ResourceId::MAX_LEN`]
    #[error("resource id is {len} chars, max {max}")]
    TooLong { len: usize, max: usize },

    /// Disallowed characters
    #[error("resource id {0:?} may only contain ASCII letters, digits, '-', '_' and '.'")]
    InvalidCharacters(String),
}

/// A stored resource
///
/// Persisted as `{"id", "fields", "documents"}`; the wire representation is
/// built by [`Resource::to_representation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    documents: Vec<Attachment>,
}

impl Resource {
    /// Empty resource with no fields or documents
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            fields: Map::new(),
            documents: Vec::new(),
        }
    }

    /// Assemble from parts
    ///
    /// Reserved keys (`id`, `documents`, framing and derived keys) are
    /// dropped from `fields`.
    #[must_use]
    pub fn from_parts(id: ResourceId, mut fields: Map<String, Value>, documents: Vec<Attachment>) -> Self {
        fields.retain(|key, _| !is_reserved_key(key));
        Self {
            id,
            fields,
            documents,
        }
    }

    /// Set an opaque field, ignoring reserved keys
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !is_reserved_key(&key) {
            self.fields.insert(key, value);
        }
        self
    }

    /// Append a document
    #[must_use]
    pub fn with_document(mut self, attachment: Attachment) -> Self {
        self.documents.push(attachment);
        self
    }

    /// Resource identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Opaque fields in stored order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up an opaque field
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Attachments in stored order
    #[inline]
    #[must_use]
    pub fn documents(&self) -> &[Attachment] {
        &self.documents
    }

    /// Find an attachment by id
    #[must_use]
    pub fn document(&self, id: &str) -> Option<&Attachment> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    /// Split into parts
    #[must_use]
    pub fn into_parts(self) -> (ResourceId, Map<String, Value>, Vec<Attachment>) {
        (self.id, self.fields, self.documents)
    }

    /// `news` entries whose `active` member is exactly `true`
    ///
    /// Empty when `news` is absent or not an array.
    #[must_use]
    pub fn active_news(&self) -> Vec<Value> {
        match self.fields.get(NEWS_KEY) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter(|entry| entry.get("active") == Some(&Value::Bool(true)))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Revision hash over the canonical persisted JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn revision(&self) -> Result<ContentHash, HashError> {
        ContentHash::compute_serializable(self)
    }

    /// Total decoded size of all documents, skipping any that do not decode
    #[must_use]
    pub fn documents_decoded_len(&self) -> usize {
        self.documents
            .iter()
            .filter_map(|doc| crate::datauri::DataUriRef::split(&doc.file_url).ok())
            .filter_map(|envelope| envelope.decoded_len().ok())
            .sum()
    }

    /// JSON-LD representation
    ///
    /// Key order: `@context`, `@id`, `@type`, `id`, fields, `documents`,
    /// `activeNews`.
    #[must_use]
    pub fn to_representation(&self, resource_type: &str) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 6);
        map.insert("@context".into(), Value::String(format!("/contexts/{resource_type}")));
        map.insert("@id".into(), Value::String(self.id.iri()));
        map.insert("@type".into(), Value::String(resource_type.to_string()));
        map.insert(ID_KEY.into(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        map.insert(
            DOCUMENTS_KEY.into(),
            Value::Array(self.documents.iter().map(Attachment::to_value).collect()),
        );
        map.insert(ACTIVE_NEWS_KEY.into(), Value::Array(self.active_news()));
        Value::Object(map)
    }
}

/// Keys a resource never stores as opaque fields
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key == ID_KEY
        || key == DOCUMENTS_KEY
        || FRAMING_KEYS.contains(&key)
        || DERIVED_KEYS.contains(&key)
}
