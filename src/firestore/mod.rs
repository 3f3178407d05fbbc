//! Cloud Firestore module.
//!
//! A thin document-store client over the Firestore REST API, using
//! `CollectionReference` and `DocumentReference` the way the web SDK does.
//! Requests carry the project's API key; [`FirebaseFirestore::with_id_token`]
//! additionally authenticates them as a signed-in user so that security rules
//! see `request.auth`.

mod convert;
pub mod models;
pub mod reference;


use self::reference::{push_segments, CollectionReference, DocumentReference};
use crate::core::ApiClients;
use crate::FirebaseApp;
use thiserror::Error;
use url::Url;

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Client for interacting with Cloud Firestore.
#[derive(Clone)]
pub struct FirebaseFirestore {
    clients: ApiClients,
    api_key: String,
    project_id: String,
    base_url: Url,
}

impl FirebaseFirestore {
    /// Derives the document-store client from an app.
    ///
    /// This is typically called via `FirebaseApp::firestore()`.
    pub fn new(app: &FirebaseApp) -> Self {
        Self {
            clients: ApiClients::new(app.api_key(), None),
            api_key: app.api_key().to_string(),
            project_id: app.project_id().to_string(),
            base_url: app.firestore_documents().clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(
        client: reqwest_middleware::ClientWithMiddleware,
        base_url: Url,
    ) -> Self {
        Self {
            clients: ApiClients::from_client(client),
            api_key: String::new(),
            project_id: "test-project".to_string(),
            base_url,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The URL documents are addressed under.
    pub fn documents_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns a copy of this client that sends requests as the user the ID
    /// token belongs to.
    pub fn with_id_token(&self, id_token: &str) -> Self {
        Self {
            clients: ApiClients::new(&self.api_key, Some(id_token)),
            api_key: self.api_key.clone(),
            project_id: self.project_id.clone(),
            base_url: self.base_url.clone(),
        }
    }

    /// Gets a `CollectionReference` from a slash-separated path
    /// (e.g. "users" or "users/alice/posts").
    pub fn collection(&self, collection_path: &str) -> CollectionReference<'_> {
        let (url, id) = self.resolve(collection_path);
        CollectionReference {
            clients: &self.clients,
            url,
            id,
        }
    }

    /// Gets a `DocumentReference` from a slash-separated path
    /// (e.g. "users/alice").
    pub fn doc(&self, document_path: &str) -> DocumentReference<'_> {
        let (url, id) = self.resolve(document_path);
        DocumentReference {
            clients: &self.clients,
            url,
            id,
        }
    }

    /// Each segment becomes one escaped URL path segment, so `#` and `?` in
    /// an id stay part of the id.
    fn resolve(&self, path: &str) -> (Url, String) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let id = segments.last().copied().unwrap_or_default().to_string();
        (push_segments(&self.base_url, segments), id)
    }
}
