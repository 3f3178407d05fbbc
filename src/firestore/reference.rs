use super::convert::{fields_to_json, to_fields};
use super::models::{Document, ListDocumentsResponse};
use super::FirestoreError;
use crate::core::{parse_error_response, ApiClients};
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

fn document_body<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FirestoreError> {
    let fields = to_fields(value)?;
    Ok(serde_json::to_vec(&serde_json::json!({ "fields": fields }))?)
}

/// Appends each item as one percent-encoded path segment.
pub(crate) fn push_segments<'s>(base: &Url, segments: impl IntoIterator<Item = &'s str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn with_query(url: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    url
}

/// Builds a field path for an update mask. Names that are not plain
/// identifiers are backtick-quoted.
pub(crate) fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if simple {
        return name.to_string();
    }

    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for c in name.chars() {
        if c == '`' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}

/// The mask `update` sends when the caller names no fields: every top-level
/// key of `value`, sorted.
pub(crate) fn default_update_mask<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<String>, FirestoreError> {
    let mut mask: Vec<String> = to_fields(value)?.keys().map(|k| field_path(k)).collect();
    mask.sort();
    Ok(mask)
}

/// A document location. Creating one does not touch the network.
#[derive(Clone)]
pub struct DocumentReference<'a> {
    pub(crate) clients: &'a ApiClients,
    pub(crate) url: Url,
    pub(crate) id: String,
}

impl<'a> DocumentReference<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Gets a subcollection of this document.
    pub fn collection(&self, collection_id: &str) -> CollectionReference<'a> {
        CollectionReference {
            clients: self.clients,
            url: push_segments(&self.url, [collection_id]),
            id: collection_id.to_string(),
        }
    }

    /// Reads the document, returning `None` when it does not exist.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        let response = self.clients.retrying.get(self.url.clone()).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Get document failed").await,
            ));
        }

        let doc: Document = response.json().await?;
        let obj = serde_json::from_value(fields_to_json(doc.fields)?)?;
        Ok(Some(obj))
    }

    /// Creates or overwrites the document.
    pub async fn set<T: Serialize>(&self, value: &T) -> Result<Document, FirestoreError> {
        self.patch(value, &[], "Set document failed").await
    }

    /// Writes only the fields named in `field_paths`, leaving the others as
    /// they are. With an empty mask every field in `value` is written. Fails
    /// if the document does not exist.
    pub async fn update<T: Serialize>(
        &self,
        value: &T,
        field_paths: &[&str],
    ) -> Result<Document, FirestoreError> {
        let mask: Vec<String> = if field_paths.is_empty() {
            default_update_mask(value)?
        } else {
            field_paths.iter().map(|p| p.to_string()).collect()
        };

        let mut params: Vec<(&str, &str)> = mask
            .iter()
            .map(|p| ("updateMask.fieldPaths", p.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        self.patch(value, &params, "Update document failed").await
    }

    async fn patch<T: Serialize>(
        &self,
        value: &T,
        params: &[(&str, &str)],
        context: &str,
    ) -> Result<Document, FirestoreError> {
        let url = with_query(&self.url, params);

        let response = self
            .clients
            .retrying
            .patch(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(document_body(value)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, context).await,
            ));
        }

        Ok(response.json().await?)
    }

    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self.clients.retrying.delete(self.url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Delete document failed").await,
            ));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct CollectionReference<'a> {
    pub(crate) clients: &'a ApiClients,
    pub(crate) url: Url,
    pub(crate) id: String,
}

impl<'a> CollectionReference<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn doc(&self, document_id: &str) -> DocumentReference<'a> {
        DocumentReference {
            clients: self.clients,
            url: push_segments(&self.url, [document_id]),
            id: document_id.to_string(),
        }
    }

    /// Lists one page of documents.
    pub async fn list_documents(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, FirestoreError> {
        let page_size = page_size.map(|n| n.to_string());
        let mut params = Vec::new();
        if let Some(size) = page_size.as_deref() {
            params.push(("pageSize", size));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let url = with_query(&self.url, &params);

        let response = self.clients.retrying.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "List documents failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Adds a document with a server-assigned id. Sent once, without retries.
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<Document, FirestoreError> {
        let response = self
            .clients
            .single_attempt
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(document_body(value)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Add document failed").await,
            ));
        }

        Ok(response.json().await?)
    }
}
