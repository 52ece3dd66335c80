//! Cloud Firestore profile store
//!
//! Merges are expressed as a REST `PATCH` on the document with one
//! `updateMask.fieldPaths` entry per supplied field. Fields outside the mask
//! are left untouched, and the document is created if it does not exist.
//!
//! A profile with no fields to write still ensures the document exists: it
//! is sent as an empty `PATCH` guarded by `currentDocument.exists=false`, and
//! the precondition failure for an existing document counts as success.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

use super::credentials::{ServiceAccountKey, TokenSource};
use super::{ProfileStore, StoreError};
use crate::config::StoreSettings;
use crate::oauth2::http::build_client;
use crate::profile::UserProfile;

/// Profile store writing to Cloud Firestore's `(default)` database
#[derive(Debug)]
pub struct FirestoreProfileStore {
    base_url: Url,
    project_id: String,
    collection: String,
    tokens: TokenSource,
    http_client: reqwest::Client,
}

impl FirestoreProfileStore {
    /// Create a store from settings, reading the service account key file
    ///
    /// # Errors
    ///
    /// Returns error if the key file is missing or invalid or the base URL
    /// cannot be parsed
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        let key = ServiceAccountKey::from_file(&settings.credentials_path)?;
        let http_client = build_client(Duration::from_millis(settings.timeout_ms))
            .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Self::new(&key, &settings.base_url, &settings.collection, http_client)
    }

    /// Create a store from an already loaded key
    ///
    /// # Errors
    ///
    /// Returns error if the private key or the base URL is invalid
    pub fn new(
        key: &ServiceAccountKey,
        base_url: &str,
        collection: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Credentials(format!("Invalid store base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Credentials(format!(
                "Invalid store base URL: {base_url}"
            )));
        }

        Ok(Self {
            base_url,
            project_id: key.project_id.clone(),
            collection: collection.to_string(),
            tokens: TokenSource::new(key, http_client.clone())?,
            http_client,
        })
    }

    /// Project the store writes into
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// REST URL of a subject's document, including the update mask
    #[must_use]
    pub fn document_url(&self, subject_id: &str, field_paths: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                self.collection.as_str(),
                subject_id,
            ]);
        }
        if !field_paths.is_empty() {
            let mut query = url.query_pairs_mut();
            for field in field_paths {
                query.append_pair("updateMask.fieldPaths", field);
            }
        }
        url
    }

    /// Firestore document body for the given fields
    #[must_use]
    pub fn document_body(fields: &[(&str, &str)]) -> Value {
        let fields: Map<String, Value> = fields
            .iter()
            .map(|(name, value)| ((*name).to_string(), json!({ "stringValue": value })))
            .collect();
        json!({ "fields": fields })
    }
}

#[async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let fields = profile.document_fields();
        let field_paths: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        let mut url = self.document_url(&profile.subject_id, &field_paths);
        let create_only = fields.is_empty();
        if create_only {
            url.query_pairs_mut()
                .append_pair("currentDocument.exists", "false");
        }
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .patch(url)
            .bearer_auth(token)
            .json(&Self::document_body(&fields))
            .send()
            .await
            .map_err(|e| StoreError::transport(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate();
        }
        if status.is_success() {
            return Ok(());
        }
        if create_only && is_existing_document(response).await {
            tracing::debug!(subject_id = %profile.subject_id, "Profile document already exists");
            return Ok(());
        }

        Err(StoreError::Rejected {
            status: status.as_u16(),
        })
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

/// Check if a failed write was refused only because the document exists
async fn is_existing_document(response: reqwest::Response) -> bool {
    response.json::<Value>().await.is_ok_and(|body| {
        matches!(
            body["error"]["status"].as_str(),
            Some("ALREADY_EXISTS" | "FAILED_PRECONDITION")
        )
    })
}
