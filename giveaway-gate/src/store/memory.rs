//! In-process profile store

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{ProfileStore, StoreError};
use crate::profile::UserProfile;

/// Profile store backed by a map of document path to fields
///
/// Contents are lost on restart. Merge semantics match the Firestore
/// backend.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    collection: String,
    documents: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryProfileStore {
    /// Create an empty store writing into `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Document path for a subject, e.g. `users/123`
    #[must_use]
    pub fn document_path(&self, subject_id: &str) -> String {
        format!("{}/{subject_id}", self.collection)
    }

    /// Snapshot of a stored document
    #[must_use]
    pub fn document(&self, path: &str) -> Option<Map<String, Value>> {
        self.documents.read().get(path).cloned()
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Check if no document has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let fields = profile.document_fields();
        let path = self.document_path(&profile.subject_id);
        let mut documents = self.documents.write();
        let document = documents.entry(path).or_default();
        for (field, value) in fields {
            document.insert(field.to_string(), Value::String(value.to_string()));
        }
        drop(documents);

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
