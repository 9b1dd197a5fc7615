//! SQLite-backed document backend for offline use and tests.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::Connection;

use super::{Document, DocumentBackend, DocumentId, DocumentPath, Fields, StoreError};
use crate::auth::Session;
use crate::db::{self, DatabaseError};
use crate::models::Collection;

pub struct LocalBackend {
    conn: Mutex<Connection>,
}

impl LocalBackend {
    /// Open (and migrate) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_database(path)?;
        tracing::info!(path = %path.display(), "Local document store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(db::open_memory_database()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database(DatabaseError::LockPoisoned))
    }
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

fn map_missing(
    e: DatabaseError,
    session: &Session,
    collection: Collection,
    id: &DocumentId,
) -> StoreError {
    match e {
        DatabaseError::NotFound { .. } => not_found(session, collection, id),
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl DocumentBackend for LocalBackend {
    async fn insert(
        &self,
        session: &Session,
        collection: Collection,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        let id = DocumentId::generate();
        let conn = self.conn()?;
        db::insert_document(&conn, session.user_id(), collection.as_str(), id.as_str(), &fields)?;
        Ok(id)
    }

    async fn put(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        db::upsert_document(&conn, session.user_id(), collection.as_str(), id.as_str(), &fields)?;
        Ok(())
    }

    async fn patch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        db::merge_document(&conn, session.user_id(), collection.as_str(), id.as_str(), &fields)
            .map_err(|e| map_missing(e, session, collection, id))
    }

    async fn remove(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        db::delete_document(&conn, session.user_id(), collection.as_str(), id.as_str())
            .map_err(|e| map_missing(e, session, collection, id))
    }

    async fn fetch(
        &self,
        session: &Session,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<Option<Fields>, StoreError> {
        let conn = self.conn()?;
        let row = db::get_document(&conn, session.user_id(), collection.as_str(), id.as_str())?;
        Ok(row.map(|r| r.body))
    }

    async fn list(
        &self,
        session: &Session,
        collection: Collection,
    ) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn()?;
        let rows = db::list_documents(&conn, session.user_id(), collection.as_str())?;
        rows.into_iter()
            .map(|row| {
                Ok(Document {
                    id: DocumentId::new(row.doc_id)?,
                    fields: row.body,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let backend = LocalBackend::open_in_memory().unwrap();
        let alice = Identity::signed_in_for_tests("alice");
        let bob = Identity::signed_in_for_tests("bob");
        let alice = alice.require().unwrap();
        let bob = bob.require().unwrap();

        backend
            .insert(alice, Collection::HeartRate, fields(json!({"bpm": 72})))
            .await
            .unwrap();

        assert_eq!(backend.list(alice, Collection::HeartRate).await.unwrap().len(), 1);
        assert!(backend.list(bob, Collection::HeartRate).await.unwrap().is_empty());
        assert!(backend.list(alice, Collection::Temperature).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_missing_reports_path() {
        let backend = LocalBackend::open_in_memory().unwrap();
        let me = Identity::signed_in_for_tests("u1");
        let id = DocumentId::new("nope").unwrap();
        let err = backend
            .remove(me.require().unwrap(), Collection::Allergies, &id)
            .await
            .unwrap_err();
        match err {
            StoreError::NotFound { path } => assert_eq!(path, "users/u1/allergies/nope"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let me = Identity::signed_in_for_tests("u1");
        let session = me.require().unwrap();

        let id = {
            let backend = LocalBackend::open(&path).unwrap();
            backend
                .insert(session, Collection::Temperature, fields(json!({"degrees": 98.6})))
                .await
                .unwrap()
        };

        let backend = LocalBackend::open(&path).unwrap();
        let body = backend
            .fetch(session, Collection::Temperature, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["degrees"], 98.6);
    }
}
