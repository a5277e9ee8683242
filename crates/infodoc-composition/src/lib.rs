//! infodoc Composition
//!
//! Turns an inbound replace payload into a validated candidate resource.
//!
//! # Core Concepts
//!
//! - [`FieldPolicy`]: server-owned keys stripped before merging
//! - [`MergeEngine`]: pure, all-or-nothing replace-merge
//! - [`MergeError`]: first violation, with attachment index and rule
//!
//! # Example
//!
//! ```rust
//! use infodoc_artifact::{Resource, ResourceId};
//! use infodoc_composition::MergeEngine;
//! use serde_json::json;
//!
//! let stored = Resource::new(ResourceId::new("1").unwrap());
//! let merged = MergeEngine::new()
//!     .merge(&stored, json!({"companyName": "Acme", "documents": []}))
//!     .unwrap();
//! assert_eq!(merged.resource.field("companyName"), Some(&json!("Acme")));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod merge;
mod policy;

pub use merge::{MergeEngine, MergeError, MergeErrorKind, Merged};
pub use policy::FieldPolicy;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
