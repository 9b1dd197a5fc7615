//! One screen model for all four vital kinds.

use async_trait::async_trait;

use crate::auth::Identity;
use crate::models::{VitalKind, VitalReading};
use crate::screen::{ScreenController, ScreenModel};
use crate::store::{DocumentBackend, DocumentId, Record};
use crate::vitals::{ReadingDraft, VitalError, VitalLog};

pub type VitalScreen<B> = ScreenController<VitalScreenModel<B>>;

pub struct VitalScreenModel<B> {
    kind: VitalKind,
    log: VitalLog<B>,
}

impl<B: DocumentBackend> VitalScreenModel<B> {
    pub fn new(kind: VitalKind, log: VitalLog<B>) -> Self {
        Self { kind, log }
    }

    pub fn kind(&self) -> VitalKind {
        self.kind
    }
}

impl<B: DocumentBackend> VitalScreen<B> {
    pub fn for_kind(kind: VitalKind, log: VitalLog<B>) -> Self {
        ScreenController::new(VitalScreenModel::new(kind, log))
    }
}

#[async_trait]
impl<B: DocumentBackend> ScreenModel for VitalScreenModel<B> {
    type Item = Record<VitalReading>;
    type Draft = ReadingDraft;
    type Removal = DocumentId;
    type Error = VitalError;

    fn blank_draft(&self) -> ReadingDraft {
        ReadingDraft::new(self.kind)
    }

    fn edit_draft(&self, item: &Record<VitalReading>) -> Option<(DocumentId, ReadingDraft)> {
        Some((item.id.clone(), ReadingDraft::from_reading(&item.value)))
    }

    async fn load(&self, identity: &Identity) -> Result<Vec<Record<VitalReading>>, VitalError> {
        self.log.history(identity, self.kind).await
    }

    async fn save(
        &self,
        identity: &Identity,
        draft: &ReadingDraft,
        editing: Option<&DocumentId>,
    ) -> Result<(), VitalError> {
        match editing {
            Some(id) => self.log.amend(identity, id, draft).await.map(|_| ()),
            None => self.log.record(identity, draft).await.map(|_| ()),
        }
    }

    async fn remove(&self, identity: &Identity, id: &DocumentId) -> Result<(), VitalError> {
        self.log.remove(identity, self.kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{AlertKind, Phase, ScreenStateError};
    use crate::store::testing::local_store;
    use crate::store::LocalBackend;
    use crate::vitals::ReadingField;

    fn screen(kind: VitalKind) -> (VitalScreen<LocalBackend>, Identity) {
        let (store, me) = local_store();
        (VitalScreen::for_kind(kind, VitalLog::new(store)), me)
    }

    #[tokio::test]
    async fn add_reading_returns_to_idle_with_refreshed_list() {
        let (mut screen, me) = screen(VitalKind::BloodPressure);
        screen.refresh(&me).await;
        assert!(screen.items().is_empty());

        screen.start_add().unwrap();
        assert!(screen.can_submit());
        screen.submit(&me).await.unwrap();

        assert_eq!(*screen.phase(), Phase::Idle);
        assert_eq!(screen.items().len(), 1);
        let alert = screen.dismiss_alert().unwrap();
        assert_eq!(alert.kind, AlertKind::Success);
        assert_eq!(alert.message, "Reading saved successfully!");
    }

    #[tokio::test]
    async fn invalid_input_keeps_draft_open() {
        let (mut screen, me) = screen(VitalKind::HeartRate);
        screen.start_add().unwrap();
        screen.draft_mut().unwrap().set(ReadingField::HeartRate, "250");
        screen.submit(&me).await.unwrap();

        assert!(screen.can_submit());
        assert_eq!(screen.draft().unwrap().input(ReadingField::HeartRate), "250");
        let alert = screen.alert().unwrap();
        assert_eq!(alert.kind, AlertKind::Invalid);
        assert_eq!(alert.title, "Invalid Input");
        assert!(alert.message.contains("40"));
        assert!(screen.items().is_empty());
    }

    #[tokio::test]
    async fn signed_out_submit_prompts_sign_in() {
        let (mut screen, _) = screen(VitalKind::Temperature);
        screen.start_add().unwrap();
        screen.submit(&Identity::Anonymous).await.unwrap();
        assert_eq!(screen.alert().unwrap().kind, AlertKind::SignInRequired);
        assert!(screen.can_submit());
    }

    #[tokio::test]
    async fn edit_updates_in_place() {
        let (mut screen, me) = screen(VitalKind::HeartRate);
        screen.start_add().unwrap();
        screen.draft_mut().unwrap().set(ReadingField::HeartRate, "72");
        screen.submit(&me).await.unwrap();

        screen.start_edit(0).unwrap();
        screen.draft_mut().unwrap().set(ReadingField::HeartRate, "110");
        screen.submit(&me).await.unwrap();

        assert_eq!(screen.items().len(), 1);
        assert_eq!(screen.items()[0].value.classification(), "Moderate exercise");
        assert_eq!(screen.alert().unwrap().message, "Reading updated successfully!");
    }

    #[tokio::test]
    async fn delete_refreshes_list() {
        let (mut screen, me) = screen(VitalKind::Glucose);
        screen.start_add().unwrap();
        screen.draft_mut().unwrap().set(ReadingField::Glucose, "95");
        screen.submit(&me).await.unwrap();

        let id = screen.items()[0].id.clone();
        screen.delete(&me, &id).await.unwrap();
        assert!(screen.items().is_empty());
        assert_eq!(screen.alert().unwrap().message, "Reading deleted successfully!");

        screen.delete(&me, &id).await.unwrap();
        assert_eq!(
            screen.alert().unwrap().message,
            "Failed to delete. Please try again."
        );
    }

    #[tokio::test]
    async fn second_submit_is_refused_while_in_flight() {
        let (mut screen, me) = screen(VitalKind::BloodPressure);
        screen.start_add().unwrap();
        let (draft, editing) = screen.begin_submit().unwrap();
        assert!(screen.is_submitting());
        assert!(!screen.can_submit());
        assert_eq!(screen.begin_submit().unwrap_err(), ScreenStateError::SubmitInFlight);
        assert_eq!(screen.cancel().unwrap_err(), ScreenStateError::SubmitInFlight);
        assert_eq!(screen.start_add().unwrap_err(), ScreenStateError::SubmitInFlight);

        let outcome = screen.model().save(&me, &draft, editing.as_ref()).await;
        screen.finish_submit(&me, outcome).await.unwrap();
        assert_eq!(*screen.phase(), Phase::Idle);
        assert_eq!(screen.items().len(), 1);
    }

    #[tokio::test]
    async fn cancel_discards_draft() {
        let (mut screen, me) = screen(VitalKind::Temperature);
        screen.start_add().unwrap();
        assert_eq!(screen.start_add().unwrap_err(), ScreenStateError::Busy);
        screen.cancel().unwrap();
        assert!(screen.draft().is_none());
        assert_eq!(screen.cancel().unwrap_err(), ScreenStateError::NotComposing);
        assert_eq!(screen.start_edit(3).unwrap_err(), ScreenStateError::NoSuchItem(3));
        screen.refresh(&me).await;
        assert!(screen.items().is_empty());
    }
}
