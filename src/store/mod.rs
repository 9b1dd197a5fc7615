//! Record Store Adapter: per-user document collections at
//! `users/{ownerId}/{collection}/{documentId}`.
//!
//! [`RecordStore`] is the only entry point used by services and screens. It
//! resolves the caller's [`Identity`] before touching the backend, so an
//! anonymous or expired identity never reaches the network or the disk.

pub mod firestore;
pub mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::{Identity, Session};
use crate::db::DatabaseError;
use crate::models::Collection;

pub use firestore::FirestoreBackend;
pub use local::LocalBackend;

/// Top-level fields of a stored document.
pub type Fields = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Please sign in to continue")]
    Unauthenticated,

    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Remote store error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Local store error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Opaque document identifier. Never empty, never contains `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::InvalidId(id));
        }
        Ok(Self(id))
    }

    /// Fresh random id (20 hex chars, like the remote store's auto ids).
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(20);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `users/{owner}/{collection}[/{id}]`, for logs and error messages.
pub struct DocumentPath<'a> {
    pub owner_id: &'a str,
    pub collection: Collection,
    pub id: Option<&'a DocumentId>,
}

impl fmt::Display for DocumentPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/{}", self.owner_id, self.collection)?;
        if let Some(id) = self.id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

/// A raw document as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

/// A typed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: DocumentId,
    pub value: T,
}

/// Storage seam. Implementations act on behalf of `session.user_id` only.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Create a document with a backend-assigned id.
    async fn insert(
        &self,
        session: &Session,
        collection: Collection,
        fields: Fields,
    ) -> Result<DocumentId, StoreError>;

    /// Create or fully replace the document at `id`.
    async fn put(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Overwrite the given top-level fields of an existing document.
    async fn patch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    async fn remove(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<(), StoreError>;

    async fn fetch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<Option<Fields>, StoreError>;

    async fn list(&self, session: &Session, collection: Collection)
        -> Result<Vec<Document>, StoreError>;
}

fn to_fields<T: Serialize + ?Sized>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, found {other}"
        ))),
    }
}

fn from_fields<T: DeserializeOwned>(fields: Fields) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Typed, identity-checked access to per-user collections.
pub struct RecordStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for RecordStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DocumentBackend> RecordStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn create<T: Serialize + Sync>(
        &self,
        identity: &Identity,
        collection: Collection,
        record: &T,
    ) -> Result<DocumentId, StoreError> {
        let session = identity.require()?;
        let fields = to_fields(record)?;
        let id = self.backend.insert(session, collection, fields).await?;
        tracing::info!(
            owner = %session.user_id(),
            collection = %collection,
            doc_id = %id,
            "Document created"
        );
        Ok(id)
    }

    pub async fn set<T: Serialize + Sync>(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &DocumentId,
        record: &T,
    ) -> Result<(), StoreError> {
        let session = identity.require()?;
        let fields = to_fields(record)?;
        self.backend.put(session, collection, id, fields).await?;
        tracing::info!(
            owner = %session.user_id(),
            collection = %collection,
            doc_id = %id,
            "Document written"
        );
        Ok(())
    }

    /// Overwrite the top-level fields present in `patch`. The document must exist.
    pub async fn update<P: Serialize + Sync + ?Sized>(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &DocumentId,
        patch: &P,
    ) -> Result<(), StoreError> {
        let session = identity.require()?;
        let fields = to_fields(patch)?;
        let field_count = fields.len();
        self.backend.patch(session, collection, id, fields).await?;
        tracing::info!(
            owner = %session.user_id(),
            collection = %collection,
            doc_id = %id,
            field_count,
            "Document updated"
        );
        Ok(())
    }

    pub async fn delete(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<(), StoreError> {
        let session = identity.require()?;
        self.backend.remove(session, collection, id).await?;
        tracing::info!(
            owner = %session.user_id(),
            collection = %collection,
            doc_id = %id,
            "Document deleted"
        );
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        identity: &Identity,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<Option<T>, StoreError> {
        let session = identity.require()?;
        match self.backend.fetch(session, collection, id).await? {
            Some(fields) => Ok(Some(from_fields(fields)?)),
            None => Ok(None),
        }
    }

    /// Every document of the collection. Documents that no longer decode
    /// as `T` are skipped with a warning.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> Result<Vec<Record<T>>, StoreError> {
        let session = identity.require()?;
        let documents = self.backend.list(session, collection).await?;
        let total = documents.len();
        let mut records = Vec::with_capacity(total);
        for doc in documents {
            match from_fields::<T>(doc.fields) {
                Ok(value) => records.push(Record { id: doc.id, value }),
                Err(e) => tracing::warn!(
                    collection = %collection,
                    doc_id = %doc.id,
                    error = %e,
                    "Skipping undecodable document"
                ),
            }
        }
        tracing::debug!(
            owner = %session.user_id(),
            collection = %collection,
            total,
            decoded = records.len(),
            "Collection listed"
        );
        Ok(records)
    }
}
