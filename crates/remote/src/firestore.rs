use std::sync::Arc;

use async_trait::async_trait;
use contactbook_core::Document;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::RemoteError;
use crate::traits::{IdentityProvider, Query, RemoteDatabase, RemoteDocument};
use crate::values::{decode_fields, document_id, encode_fields, field_path};

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: String,
    pub base_url: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_FIRESTORE_URL.to_string(),
        }
    }

    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id
        )
    }
}

/// Firestore over its REST surface. Requests carry the current identity's
/// ID token when there is one.
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: String,
    api_key: String,
    identity: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<WireDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_http(reqwest::Client::new(), config, identity)
    }

    pub fn with_http(
        http: reqwest::Client,
        config: &FirestoreConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            http,
            documents_url: config.documents_url(),
            api_key: config.api_key.clone(),
            identity,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query(&[("key", self.api_key.as_str())]);
        match self.identity.current_identity().and_then(|i| i.id_token) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.documents_url)
    }
}

pub(crate) fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });
    if let Some(order) = &query.order_by {
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field_path(&order.field) },
            "direction": order.direction.as_str(),
        }]);
    }
    json!({ "structuredQuery": structured })
}

/// Map a Firestore error status onto the error kinds callers branch on.
pub(crate) fn classify(code: u16, status: &str, message: String) -> RemoteError {
    match status {
        "FAILED_PRECONDITION" => RemoteError::QueryRejected(message),
        "NOT_FOUND" => RemoteError::NotFound(message),
        "PERMISSION_DENIED" | "UNAUTHENTICATED" => RemoteError::PermissionDenied(message),
        _ => RemoteError::Status {
            code,
            status: status.to_string(),
            message,
        },
    }
}

pub(crate) fn parse_error(code: u16, body: &str) -> RemoteError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorEnvelope>>(body)
            .ok()
            .and_then(|mut all| (!all.is_empty()).then(|| all.swap_remove(0)))
    });
    match envelope {
        Some(ErrorEnvelope { error }) => {
            let code = if error.code == 0 { code } else { error.code };
            classify(code, &error.status, error.message)
        }
        None => RemoteError::Status {
            code,
            status: String::new(),
            message: body.to_string(),
        },
    }
}

fn to_remote_document(wire: WireDocument) -> Result<RemoteDocument, RemoteError> {
    let id = document_id(&wire.name)
        .ok_or_else(|| RemoteError::Decode(format!("bad document name: {}", wire.name)))?
        .to_string();
    Ok(RemoteDocument {
        id,
        fields: decode_fields(&wire.fields)?,
    })
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_error(status.as_u16(), &body))
}

#[async_trait]
impl RemoteDatabase for FirestoreClient {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<RemoteDocument>, RemoteError> {
        let url = format!("{}:runQuery", self.documents_url);
        tracing::debug!(collection, ordered = query.order_by.is_some(), "firestore query");
        let request = self.authorize(self.http.post(url)).json(&structured_query(collection, query));
        let response = check(request.send().await?).await?;
        let items: Vec<RunQueryItem> = response.json().await?;
        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(to_remote_document)
            .collect()
    }

    async fn create(&self, collection: &str, fields: Document) -> Result<String, RemoteError> {
        let url = format!("{}/{collection}", self.documents_url);
        tracing::debug!(collection, "firestore create");
        let request = self
            .authorize(self.http.post(url))
            .json(&json!({ "fields": encode_fields(&fields) }));
        let response = check(request.send().await?).await?;
        let created: WireDocument = response.json().await?;
        Ok(to_remote_document(created)?.id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), RemoteError> {
        tracing::debug!(collection, id, "firestore update");
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", field_path(key)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));
        let request = self
            .authorize(self.http.patch(self.document_url(collection, id)))
            .query(&params)
            .json(&json!({ "fields": encode_fields(&fields) }));
        check(request.send().await?).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        tracing::debug!(collection, id, "firestore delete");
        let request = self
            .authorize(self.http.delete(self.document_url(collection, id)))
            .query(&[("currentDocument.exists", "true")]);
        check(request.send().await?).await?;
        Ok(())
    }
}
