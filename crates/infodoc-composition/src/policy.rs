//! Server-owned field policy
//!
//! Provides [`FieldPolicy`], the explicit deny set of top-level keys a client
//! may send but never write.

use infodoc_artifact::resource::{ACTIVE_NEWS_KEY, FRAMING_KEYS, ID_KEY};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Deny set of server-owned keys
///
/// Denied keys are removed from an inbound payload before it is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    denied: BTreeSet<String>,
}

impl FieldPolicy {
    /// Policy denying nothing
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            denied: BTreeSet::new(),
        }
    }

    /// Also deny `key`
    #[must_use]
    pub fn with_denied(mut self, key: impl Into<String>) -> Self {
        self.denied.insert(key.into());
        self
    }

    /// Check whether `key` is server-owned
    #[inline]
    #[must_use]
    pub fn is_denied(&self, key: &str) -> bool {
        self.denied.contains(key)
    }

    /// Denied keys in sorted order
    pub fn denied(&self) -> impl Iterator<Item = &str> {
        self.denied.iter().map(String::as_str)
    }

    /// Split a payload into writable fields and the names of stripped keys
    ///
    /// Writable fields keep their payload order.
    #[must_use]
    pub fn partition(&self, payload: Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
        let mut kept = Map::with_capacity(payload.len());
        let mut stripped = Vec::new();
        for (key, value) in payload {
            if self.is_denied(&key) {
                stripped.push(key);
            } else {
                kept.insert(key, value);
            }
        }
        (kept, stripped)
    }
}

impl Default for FieldPolicy {
    /// `id`, the JSON-LD framing keys, and `activeNews`
    fn default() -> Self {
        let mut policy = Self::empty().with_denied(ID_KEY).with_denied(ACTIVE_NEWS_KEY);
        for key in FRAMING_KEYS {
            policy = policy.with_denied(key);
        }
        policy
    }
}
