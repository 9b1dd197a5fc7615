//! Vital reading lifecycle: validate → classify → persist → re-query.
//! One service for every vital kind; the kind's descriptor picks the collection.

use thiserror::Error;

use crate::auth::Identity;
use crate::models::{VitalKind, VitalReading};
use crate::store::{DocumentBackend, DocumentId, Record, RecordStore, StoreError};
use crate::vitals::descriptor::descriptor;
use crate::vitals::draft::ReadingDraft;
use crate::vitals::validation::ValidationError;

#[derive(Error, Debug)]
pub enum VitalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct VitalLog<B> {
    store: RecordStore<B>,
}

impl<B> Clone for VitalLog<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<B: DocumentBackend> VitalLog<B> {
    pub fn new(store: RecordStore<B>) -> Self {
        Self { store }
    }

    /// Build the reading a draft describes, owned by the identity's user.
    /// Validation runs before the identity check so form errors surface
    /// even when signed out.
    fn build(identity: &Identity, draft: &ReadingDraft) -> Result<VitalReading, VitalError> {
        let valid = draft.validate()?;
        let session = identity.require()?;
        Ok(VitalReading::new(
            session.user_id(),
            valid.measurement,
            valid.unit,
            valid.taken_at,
            valid.notes,
        ))
    }

    pub async fn record(
        &self,
        identity: &Identity,
        draft: &ReadingDraft,
    ) -> Result<Record<VitalReading>, VitalError> {
        let reading = Self::build(identity, draft)?;
        let collection = descriptor(draft.kind()).collection;
        let id = self.store.create(identity, collection, &reading).await?;
        tracing::info!(
            kind = %draft.kind(),
            classification = %reading.classification(),
            "Vital reading recorded"
        );
        Ok(Record { id, value: reading })
    }

    /// Replace the values of an existing reading. The classification is
    /// recomputed from the new values before the write.
    pub async fn amend(
        &self,
        identity: &Identity,
        id: &DocumentId,
        draft: &ReadingDraft,
    ) -> Result<VitalReading, VitalError> {
        let reading = Self::build(identity, draft)?;
        let collection = descriptor(draft.kind()).collection;
        self.store.update(identity, collection, id, &reading).await?;
        tracing::info!(
            kind = %draft.kind(),
            doc_id = %id,
            classification = %reading.classification(),
            "Vital reading amended"
        );
        Ok(reading)
    }

    pub async fn remove(
        &self,
        identity: &Identity,
        kind: VitalKind,
        id: &DocumentId,
    ) -> Result<(), VitalError> {
        self.store
            .delete(identity, descriptor(kind).collection, id)
            .await?;
        Ok(())
    }

    /// All readings of `kind`, newest first.
    pub async fn history(
        &self,
        identity: &Identity,
        kind: VitalKind,
    ) -> Result<Vec<Record<VitalReading>>, VitalError> {
        let mut records: Vec<Record<VitalReading>> = self
            .store
            .list_all(identity, descriptor(kind).collection)
            .await?;
        records.retain(|r| r.value.kind() == kind);
        records.sort_by(|a, b| b.value.timestamp().cmp(&a.value.timestamp()));
        Ok(records)
    }

    pub async fn latest(
        &self,
        identity: &Identity,
        kind: VitalKind,
    ) -> Result<Option<Record<VitalReading>>, VitalError> {
        Ok(self.history(identity, kind).await?.into_iter().next())
    }
}
