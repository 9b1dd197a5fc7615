//! Document rows, one JSON body per `users/{owner}/{collection}/{id}`.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::db::DatabaseError;

/// A stored document as read back from SQLite.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub doc_id: String,
    pub body: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_body(body: &Map<String, Value>) -> String {
    Value::Object(body.clone()).to_string()
}

fn decode_body(doc_id: &str, text: &str) -> Result<Map<String, Value>, DatabaseError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DatabaseError::CorruptBody {
            id: doc_id.to_string(),
            reason: format!("expected object, found {other}"),
        }),
        Err(e) => Err(DatabaseError::CorruptBody {
            id: doc_id.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Insert a new document. Fails if the id already exists.
pub fn insert_document(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
    doc_id: &str,
    body: &Map<String, Value>,
) -> Result<(), DatabaseError> {
    let stamp = now_stamp();
    conn.execute(
        "INSERT INTO documents (owner_id, collection, doc_id, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![owner_id, collection, doc_id, encode_body(body), stamp],
    )?;
    Ok(())
}

/// Create or fully replace a document at a caller-chosen id.
pub fn upsert_document(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
    doc_id: &str,
    body: &Map<String, Value>,
) -> Result<(), DatabaseError> {
    let stamp = now_stamp();
    conn.execute(
        "INSERT INTO documents (owner_id, collection, doc_id, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (owner_id, collection, doc_id)
         DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![owner_id, collection, doc_id, encode_body(body), stamp],
    )?;
    Ok(())
}

/// Merge top-level fields into an existing document.
pub fn merge_document(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
    doc_id: &str,
    patch: &Map<String, Value>,
) -> Result<(), DatabaseError> {
    let mut row = get_document(conn, owner_id, collection, doc_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: collection.to_string(),
            id: doc_id.to_string(),
        }
    })?;
    for (key, value) in patch {
        row.body.insert(key.clone(), value.clone());
    }
    conn.execute(
        "UPDATE documents SET body = ?4, updated_at = ?5
         WHERE owner_id = ?1 AND collection = ?2 AND doc_id = ?3",
        params![owner_id, collection, doc_id, encode_body(&row.body), now_stamp()],
    )?;
    Ok(())
}

/// Delete a document by id.
pub fn delete_document(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
    doc_id: &str,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM documents WHERE owner_id = ?1 AND collection = ?2 AND doc_id = ?3",
        params![owner_id, collection, doc_id],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: collection.to_string(),
            id: doc_id.to_string(),
        });
    }
    Ok(())
}

pub fn get_document(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
    doc_id: &str,
) -> Result<Option<DocumentRow>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT doc_id, body, created_at, updated_at FROM documents
             WHERE owner_id = ?1 AND collection = ?2 AND doc_id = ?3",
            params![owner_id, collection, doc_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match raw {
        Some((doc_id, body, created_at, updated_at)) => Ok(Some(DocumentRow {
            body: decode_body(&doc_id, &body)?,
            doc_id,
            created_at,
            updated_at,
        })),
        None => Ok(None),
    }
}

/// All documents of one owner's collection, oldest first.
pub fn list_documents(
    conn: &Connection,
    owner_id: &str,
    collection: &str,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, body, created_at, updated_at FROM documents
         WHERE owner_id = ?1 AND collection = ?2
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![owner_id, collection], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (doc_id, body, created_at, updated_at) = row?;
        documents.push(DocumentRow {
            body: decode_body(&doc_id, &body)?,
            doc_id,
            created_at,
            updated_at,
        });
    }
    Ok(documents)
}
