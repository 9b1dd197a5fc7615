//! Firestore REST v1 backend.
//!
//! Documents live at
//! `{base}/projects/{project}/databases/(default)/documents/users/{uid}/{collection}/{id}`
//! and every request carries the session's ID token as a bearer token.
//! Field values travel in Firestore's typed encoding (`stringValue`,
//! `integerValue`, `mapValue`, ...); see [`encode_value`] / [`decode_value`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};

use super::{Document, DocumentBackend, DocumentId, DocumentPath, Fields, StoreError};
use crate::auth::Session;
use crate::config::{AppConfig, ConfigError};
use crate::models::Collection;

const DEFAULT_PAGE_SIZE: u32 = 300;

pub struct FirestoreBackend {
    base_url: String,
    project_id: String,
    page_size: u32,
    client: reqwest::Client,
}

impl FirestoreBackend {
    pub fn new(base_url: &str, project_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.require_remote()?;
        Ok(Self::new(&config.firestore_base_url, &config.project_id))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn collection_url(&self, owner_id: &str, collection: Collection) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/users/{}/{}",
            self.base_url, self.project_id, owner_id, collection
        )
    }

    fn document_url(&self, owner_id: &str, collection: Collection, id: &DocumentId) -> String {
        format!("{}/{}", self.collection_url(owner_id, collection), id)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
        path: DocumentPath<'_>,
    ) -> Result<Option<reqwest::Response>, StoreError> {
        let response = request
            .bearer_auth(session.id_token())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    StoreError::Transport(format!("Cannot reach document store at {}", self.base_url))
                } else if e.is_timeout() {
                    StoreError::Transport("Document store request timed out".into())
                } else {
                    StoreError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status.as_u16() == 404 {
            return Ok(None);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            path = %path,
            status = status.as_u16(),
            "Document store request failed"
        );
        Err(map_status(status.as_u16(), &body))
    }

    fn not_found(session: &Session, collection: Collection, id: &DocumentId) -> StoreError {
        StoreError::NotFound {
            path: DocumentPath {
                owner_id: session.user_id(),
                collection,
                id: Some(id),
            }
            .to_string(),
        }
    }
}

fn map_status(status: u16, body: &str) -> StoreError {
    match status {
        401 => StoreError::Unauthenticated,
        403 => StoreError::PermissionDenied,
        _ => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            StoreError::Remote { status, message }
        }
    }
}

#[derive(Deserialize)]
struct RemoteDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RemoteDocument {
    fn id(&self) -> Result<DocumentId, StoreError> {
        let last = self.name.rsplit('/').next().unwrap_or_default();
        DocumentId::new(last)
    }

    fn into_document(self) -> Result<Document, StoreError> {
        Ok(Document {
            id: self.id()?,
            fields: decode_fields(&self.fields)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RemoteDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl DocumentBackend for FirestoreBackend {
    async fn insert(
        &self,
        session: &Session,
        collection: Collection,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        let url = self.collection_url(session.user_id(), collection);
        let body = json!({ "fields": encode_fields(&fields) });
        let path = DocumentPath { owner_id: session.user_id(), collection, id: None };
        let response = self
            .send(self.client.post(&url).json(&body), session, path)
            .await?
            .ok_or_else(|| StoreError::Remote {
                status: 404,
                message: format!("Collection not found: users/{}/{}", session.user_id(), collection),
            })?;
        let doc: RemoteDocument = read_json(response).await?;
        doc.id()
    }

    async fn put(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let url = self.document_url(session.user_id(), collection, id);
        let body = json!({ "fields": encode_fields(&fields) });
        let path = DocumentPath { owner_id: session.user_id(), collection, id: Some(id) };
        self.send(self.client.patch(&url).json(&body), session, path)
            .await?
            .ok_or_else(|| Self::not_found(session, collection, id))?;
        Ok(())
    }

    async fn patch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let url = self.document_url(session.user_id(), collection, id);
        let mut query: Vec<(&str, String)> = vec![("currentDocument.exists", "true".into())];
        query.extend(fields.keys().map(|k| ("updateMask.fieldPaths", field_path(k))));
        let body = json!({ "fields": encode_fields(&fields) });
        let path = DocumentPath { owner_id: session.user_id(), collection, id: Some(id) };
        self.send(self.client.patch(&url).query(&query).json(&body), session, path)
            .await?
            .ok_or_else(|| Self::not_found(session, collection, id))?;
        Ok(())
    }

    async fn remove(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<(), StoreError> {
        let url = self.document_url(session.user_id(), collection, id);
        let path = DocumentPath { owner_id: session.user_id(), collection, id: Some(id) };
        let request = self
            .client
            .delete(&url)
            .query(&[("currentDocument.exists", "true")]);
        self.send(request, session, path)
            .await?
            .ok_or_else(|| Self::not_found(session, collection, id))?;
        Ok(())
    }

    async fn fetch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<Option<Fields>, StoreError> {
        let url = self.document_url(session.user_id(), collection, id);
        let path = DocumentPath { owner_id: session.user_id(), collection, id: Some(id) };
        match self.send(self.client.get(&url), session, path).await? {
            Some(response) => {
                let doc: RemoteDocument = read_json(response).await?;
                Ok(Some(decode_fields(&doc.fields)?))
            }
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        session: &Session,
        collection: Collection,
    ) -> Result<Vec<Document>, StoreError> {
        let url = self.collection_url(session.user_id(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("pageSize", self.page_size.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let path = DocumentPath { owner_id: session.user_id(), collection, id: None };
            let Some(response) = self.send(self.client.get(&url).query(&query), session, path).await?
            else {
                // A collection with no documents can answer 404.
                break;
            };
            let page: ListResponse = read_json(response).await?;
            for doc in page.documents {
                documents.push(doc.into_document()?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(documents)
    }
}

/// Field path for an update mask. Non-identifier keys are backtick-quoted.
fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

// ═══════════════════════════════════════════════════════════
// Typed value codec
// ═══════════════════════════════════════════════════════════

/// Encode a plain JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every top-level field.
pub fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, StoreError> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decode a Firestore typed value into plain JSON. Timestamps, references
/// and bytes come back as strings.
pub fn decode_value(typed: &Value) -> Result<Value, StoreError> {
    let Some(obj) = typed.as_object() else {
        return Err(bad_value(typed));
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Err(bad_value(typed));
    };
    let value = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(|| bad_value(typed))?),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            Value::from(parsed.ok_or_else(|| bad_value(typed))?)
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            match parsed.and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                // NaN and infinities have no JSON form.
                None => Value::Null,
            }
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().ok_or_else(|| bad_value(typed))?.to_string())
        }
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let items = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => Value::Object(decode_fields(fields)?),
            _ => Value::Object(Map::new()),
        },
        _ => return Err(bad_value(typed)),
    };
    Ok(value)
}

fn bad_value(typed: &Value) -> StoreError {
    StoreError::Serialization(format!("unsupported Firestore value: {typed}"))
}
