//! infodoc Artifact Model
//!
//! Resources with documents embedded inline as base64 data URIs.
//!
//! # Core Concepts
//!
//! - [`DataUri`] / [`datauri`]: `data:<mime>;base64,<payload>` codec
//! - [`Attachment`]: document record carried in a resource's `documents`
//! - [`validate`]: per-attachment checks against a running [`SizeBudget`]
//! - [`Resource`]: opaque fields plus documents, addressed by [`ResourceId`]
//! - [`ContentHash`]: BLAKE3 revision of a stored resource
//!
//! # Example
//!
//! ```rust
//! use infodoc_artifact::{datauri, validate, SizeBudget, SizeLimits};
//! use serde_json::json;
//!
//! let entry = json!({
//!     "id": "doc-1",
//!     "fileName": "hello.txt",
//!     "fileUrl": datauri::encode("text/plain", b"Hello World"),
//! });
//! let mut budget = SizeBudget::new(SizeLimits::default());
//! let validated = validate(0, &entry, &mut budget).unwrap();
//! assert_eq!(validated.decoded_len(), 11);
//! ```

#![allow(missing_docs)]

pub mod attachment;
pub mod datauri;
mod hash;
pub mod resource;

pub use attachment::{
    validate, Attachment, AttachmentError, AttachmentLocator, Rule, SizeBudget, SizeLimits,
    SizeScope, ValidatedAttachment, DEFAULT_MAX_ATTACHMENT_BYTES, DEFAULT_MAX_TOTAL_BYTES,
};
pub use datauri::{CodecError, DataUri, DataUriRef};
pub use hash::{ContentHash, HashError};
pub use resource::{Resource, ResourceId, ResourceIdError, DEFAULT_RESOURCE_TYPE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
