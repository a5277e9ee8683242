//! Testing utilities for infodoc workspace
//!
//! Shared fixtures: resources shaped like the deployed general-info record,
//! attachment payload builders, and stores.

#![allow(missing_docs)]

use infodoc_artifact::{datauri, Resource, ResourceId};
use infodoc_store::{BackendError, MemoryBackend, ResourceBackend, ResourceStore, StoreConfig};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn resource_id(id: &str) -> ResourceId {
    ResourceId::new(id).unwrap()
}

/// Resource with the opaque fields the deployed record carries
pub fn general_info(id: &str) -> Resource {
    Resource::new(resource_id(id))
        .with_field("companyName", json!("Acme Renovation"))
        .with_field("siret", json!("123 456 789 00012"))
        .with_field("address", json!("1 rue de la Paix, Paris"))
        .with_field("contactEmail", json!("contact@example.com"))
        .with_field("telephone", json!("+33 1 23 45 67 89"))
        .with_field("heroText", json!("Welcome"))
        .with_field(
            "news",
            json!([
                {"title": "Opening", "active": true},
                {"title": "Archived", "active": false}
            ]),
        )
}

/// Attachment entry as a client would send it
pub fn attachment_json(id: &str, file_name: &str, content: &[u8]) -> Value {
    json!({
        "id": id,
        "name": format!("Document {id}"),
        "date": "2024-05-01",
        "fileName": file_name,
        "fileUrl": datauri::encode("application/octet-stream", content),
    })
}

/// Attachment entry whose decoded content is exactly `len` bytes
pub fn attachment_of_len(id: &str, len: usize) -> Value {
    attachment_json(id, &format!("{id}.bin"), &vec![0x42; len])
}

/// Replace payload carrying only `documents`
pub fn documents_payload(documents: Vec<Value>) -> Value {
    json!({ "documents": documents })
}

/// Store over a memory backend with `ids` seeded as [`general_info`]
pub async fn seeded_store(ids: &[&str], config: StoreConfig) -> Arc<ResourceStore> {
    let store = ResourceStore::new(Arc::new(MemoryBackend::new())).with_config(config);
    for id in ids {
        store.insert(general_info(id)).await.unwrap();
    }
    Arc::new(store)
}

/// Backend whose every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingBackend;

#[async_trait::async_trait]
impl ResourceBackend for FailingBackend {
    async fn load(&self, _id: &ResourceId) -> Result<Option<Resource>, BackendError> {
        Err(BackendError::Unavailable("failing backend".into()))
    }

    async fn save(&self, _resource: &Resource) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("failing backend".into()))
    }

    async fn ids(&self) -> Result<Vec<ResourceId>, BackendError> {
        Err(BackendError::Unavailable("failing backend".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
