//! Radiology images: references to pictures kept on the device, with a
//! capture date and editable notes.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use thiserror::Error;

use crate::auth::Identity;
use crate::models::{Collection, RadiologyImage};
use crate::store::{DocumentBackend, DocumentId, Record, RecordStore, StoreError};
use crate::vitals::validation::{validate_notes, ValidationError};

#[derive(Error, Debug)]
pub enum RadiologyError {
    #[error("No image selected")]
    MissingImage,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a picture came from; names unnamed pictures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    Gallery,
}

impl ImageSource {
    fn fallback_name(self) -> String {
        let prefix = match self {
            ImageSource::Camera => "Camera",
            ImageSource::Gallery => "Gallery",
        };
        format!("{prefix}_Image_{}", Utc::now().timestamp_millis())
    }
}

pub struct RadiologyArchive<B> {
    store: RecordStore<B>,
}

impl<B: DocumentBackend> RadiologyArchive<B> {
    pub fn new(store: RecordStore<B>) -> Self {
        Self { store }
    }

    pub async fn add_image(
        &self,
        identity: &Identity,
        source: ImageSource,
        uri: &str,
        file_name: Option<&str>,
        date: NaiveDate,
    ) -> Result<Record<RadiologyImage>, RadiologyError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(RadiologyError::MissingImage);
        }
        let name = file_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| source.fallback_name());
        let image = RadiologyImage {
            name,
            uri: uri.to_string(),
            date,
            notes: String::new(),
        };
        let id = self
            .store
            .create(identity, Collection::Radiology, &image)
            .await?;
        tracing::info!(doc_id = %id, "Radiology image saved");
        Ok(Record { id, value: image })
    }

    /// Replace the notes of a saved image. Blank notes clear them.
    pub async fn save_notes(
        &self,
        identity: &Identity,
        id: &DocumentId,
        notes: &str,
    ) -> Result<String, RadiologyError> {
        let notes = validate_notes(Some(notes))?.unwrap_or_default();
        self.store
            .update(identity, Collection::Radiology, id, &json!({ "notes": notes }))
            .await?;
        Ok(notes)
    }

    /// Saved images, most recent capture date first.
    pub async fn images(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Record<RadiologyImage>>, RadiologyError> {
        let mut images: Vec<Record<RadiologyImage>> =
            self.store.list_all(identity, Collection::Radiology).await?;
        images.sort_by(|a, b| b.value.date.cmp(&a.value.date));
        Ok(images)
    }
}
