//! Screen controllers.
//!
//! Every list-and-form screen runs the same state machine:
//!
//! ```text
//! Idle ──start_add/start_edit──▶ Composing ──submit──▶ Submitting
//!  ▲                               │    ▲                 │
//!  └────────────cancel─────────────┘    └────failure──────┤
//!  ▲                                                      │
//!  └──────────────────success (list re-queried)───────────┘
//! ```
//!
//! A [`ScreenModel`] supplies the screen-specific parts (how to load the
//! list, how to save a draft). [`ScreenController`] owns the list, the phase
//! and the alert, and never lets a second submit start while one is running.

pub mod allergies;
pub mod vitals;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::auth::Identity;
use crate::store::{DocumentId, StoreError};

pub use allergies::{AllergyDraft, AllergyRemoval, AllergyScreen, AllergyScreenModel};
pub use vitals::{VitalScreen, VitalScreenModel};

// ═══════════════════════════════════════════════════════════
// Alerts
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Success,
    /// User-correctable input problem.
    Invalid,
    SignInRequired,
    /// Remote or processing failure; the user may retry.
    Failure,
}

/// What the screen shows after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenAlert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl ScreenAlert {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            title: "Success".into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Invalid,
            title: "Invalid Input".into(),
            message: message.into(),
        }
    }

    pub fn sign_in_required() -> Self {
        Self {
            kind: AlertKind::SignInRequired,
            title: "Sign In Required".into(),
            message: "Please sign in to save readings".into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Failure,
            title: "Error".into(),
            message: message.into(),
        }
    }

    /// Alert for a store failure during `action`.
    pub fn for_store(error: &StoreError, action: Action) -> Self {
        match error {
            StoreError::Unauthenticated => Self::sign_in_required(),
            other => {
                tracing::warn!(error = %other, action = action.verb(), "Store operation failed");
                Self::failure(format!("Failed to {}. Please try again.", action.verb()))
            }
        }
    }
}

/// Operation an error came from; picks the alert wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Load,
    Save,
    Delete,
}

impl Action {
    pub fn verb(self) -> &'static str {
        match self {
            Action::Load => "load",
            Action::Save => "save",
            Action::Delete => "delete",
        }
    }
}

/// Errors that know how to present themselves.
pub trait AlertSource {
    fn to_alert(&self, action: Action) -> ScreenAlert;
}

impl AlertSource for StoreError {
    fn to_alert(&self, action: Action) -> ScreenAlert {
        ScreenAlert::for_store(self, action)
    }
}

impl AlertSource for crate::vitals::VitalError {
    fn to_alert(&self, action: Action) -> ScreenAlert {
        match self {
            Self::Validation(e) => ScreenAlert::invalid(e.to_string()),
            Self::Store(e) => ScreenAlert::for_store(e, action),
        }
    }
}

impl AlertSource for crate::allergies::AllergyError {
    fn to_alert(&self, action: Action) -> ScreenAlert {
        match self {
            Self::Store(e) => ScreenAlert::for_store(e, action),
            other => ScreenAlert::invalid(other.to_string()),
        }
    }
}

impl AlertSource for crate::lab_report::LabReportError {
    fn to_alert(&self, action: Action) -> ScreenAlert {
        match self {
            Self::Store(e) => ScreenAlert::for_store(e, action),
            Self::EmptyImage => ScreenAlert::invalid(self.to_string()),
            // Upload and processing failures carry the service's own text.
            other => ScreenAlert::failure(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Model seam
// ═══════════════════════════════════════════════════════════

#[async_trait]
pub trait ScreenModel: Send + Sync {
    type Item: Clone + Send + Sync;
    type Draft: Clone + Send + Sync;
    type Removal: Send + Sync;
    type Error: AlertSource + std::error::Error + Send;

    fn blank_draft(&self) -> Self::Draft;

    /// Draft pre-filled from `item`, with the id it will overwrite.
    /// `None` when items of this screen cannot be edited.
    fn edit_draft(&self, item: &Self::Item) -> Option<(DocumentId, Self::Draft)>;

    async fn load(&self, identity: &Identity) -> Result<Vec<Self::Item>, Self::Error>;

    async fn save(
        &self,
        identity: &Identity,
        draft: &Self::Draft,
        editing: Option<&DocumentId>,
    ) -> Result<(), Self::Error>;

    async fn remove(&self, identity: &Identity, removal: &Self::Removal) -> Result<(), Self::Error>;

    fn saved_message(&self, _draft: &Self::Draft, edited: bool) -> String {
        if edited {
            "Reading updated successfully!".into()
        } else {
            "Reading saved successfully!".into()
        }
    }

    fn removed_message(&self, _removal: &Self::Removal) -> String {
        "Reading deleted successfully!".into()
    }
}

// ═══════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenStateError {
    #[error("Finish or cancel the current form first")]
    Busy,

    #[error("No form is open")]
    NotComposing,

    #[error("A save is already in progress")]
    SubmitInFlight,

    #[error("This entry cannot be edited")]
    NotEditable,

    #[error("No entry at position {0}")]
    NoSuchItem(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase<D> {
    Idle,
    Composing { draft: D, editing: Option<DocumentId> },
    Submitting { draft: D, editing: Option<DocumentId> },
}

pub struct ScreenController<M: ScreenModel> {
    model: M,
    items: Vec<M::Item>,
    phase: Phase<M::Draft>,
    alert: Option<ScreenAlert>,
}

impl<M: ScreenModel> ScreenController<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            items: Vec::new(),
            phase: Phase::Idle,
            alert: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn items(&self) -> &[M::Item] {
        &self.items
    }

    pub fn phase(&self) -> &Phase<M::Draft> {
        &self.phase
    }

    pub fn alert(&self) -> Option<&ScreenAlert> {
        self.alert.as_ref()
    }

    pub fn dismiss_alert(&mut self) -> Option<ScreenAlert> {
        self.alert.take()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting { .. })
    }

    /// The submit control is enabled only while composing.
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, Phase::Composing { .. })
    }

    pub fn start_add(&mut self) -> Result<(), ScreenStateError> {
        self.ensure_idle()?;
        self.phase = Phase::Composing {
            draft: self.model.blank_draft(),
            editing: None,
        };
        Ok(())
    }

    pub fn start_edit(&mut self, index: usize) -> Result<(), ScreenStateError> {
        self.ensure_idle()?;
        let item = self
            .items
            .get(index)
            .ok_or(ScreenStateError::NoSuchItem(index))?;
        let (id, draft) = self
            .model
            .edit_draft(item)
            .ok_or(ScreenStateError::NotEditable)?;
        self.phase = Phase::Composing {
            draft,
            editing: Some(id),
        };
        Ok(())
    }

    /// Open an already-built draft (e.g. "add item" on a specific category).
    pub fn start_with(&mut self, draft: M::Draft) -> Result<(), ScreenStateError> {
        self.ensure_idle()?;
        self.phase = Phase::Composing {
            draft,
            editing: None,
        };
        Ok(())
    }

    /// Mutable access to the draft while composing.
    pub fn draft_mut(&mut self) -> Option<&mut M::Draft> {
        match &mut self.phase {
            Phase::Composing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&M::Draft> {
        match &self.phase {
            Phase::Composing { draft, .. } | Phase::Submitting { draft, .. } => Some(draft),
            Phase::Idle => None,
        }
    }

    /// Discard the draft. Only valid while composing.
    pub fn cancel(&mut self) -> Result<(), ScreenStateError> {
        match self.phase {
            Phase::Composing { .. } => {
                self.phase = Phase::Idle;
                Ok(())
            }
            Phase::Submitting { .. } => Err(ScreenStateError::SubmitInFlight),
            Phase::Idle => Err(ScreenStateError::NotComposing),
        }
    }

    /// Composing → Submitting. Returns what to save.
    pub fn begin_submit(&mut self) -> Result<(M::Draft, Option<DocumentId>), ScreenStateError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Composing { draft, editing } => {
                self.phase = Phase::Submitting {
                    draft: draft.clone(),
                    editing: editing.clone(),
                };
                Ok((draft, editing))
            }
            other => {
                let err = match other {
                    Phase::Submitting { .. } => ScreenStateError::SubmitInFlight,
                    _ => ScreenStateError::NotComposing,
                };
                self.phase = other;
                Err(err)
            }
        }
    }

    /// Submitting → Idle (list re-queried) on success, or back to
    /// Composing with the draft intact on failure.
    pub async fn finish_submit(
        &mut self,
        identity: &Identity,
        outcome: Result<(), M::Error>,
    ) -> Result<(), ScreenStateError> {
        let (draft, editing) = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Submitting { draft, editing } => (draft, editing),
            other => {
                self.phase = other;
                return Err(ScreenStateError::NotComposing);
            }
        };
        match outcome {
            Ok(()) => {
                self.alert = Some(ScreenAlert::success(
                    self.model.saved_message(&draft, editing.is_some()),
                ));
                self.reload(identity).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Submit failed; draft kept");
                self.alert = Some(e.to_alert(Action::Save));
                self.phase = Phase::Composing { draft, editing };
            }
        }
        Ok(())
    }

    /// Save the open draft.
    pub async fn submit(&mut self, identity: &Identity) -> Result<(), ScreenStateError> {
        let (draft, editing) = self.begin_submit()?;
        let outcome = self.model.save(identity, &draft, editing.as_ref()).await;
        self.finish_submit(identity, outcome).await
    }

    /// Re-query the list. A failure keeps the previous list and raises an alert.
    pub async fn refresh(&mut self, identity: &Identity) {
        self.reload(identity).await;
    }

    async fn reload(&mut self, identity: &Identity) {
        match self.model.load(identity).await {
            Ok(items) => self.items = items,
            Err(e) => self.alert = Some(e.to_alert(Action::Load)),
        }
    }

    /// Delete from the list view, then re-query.
    pub async fn delete(
        &mut self,
        identity: &Identity,
        removal: &M::Removal,
    ) -> Result<(), ScreenStateError> {
        self.ensure_idle()?;
        match self.model.remove(identity, removal).await {
            Ok(()) => {
                self.alert = Some(ScreenAlert::success(self.model.removed_message(removal)));
                self.reload(identity).await;
            }
            Err(e) => self.alert = Some(e.to_alert(Action::Delete)),
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), ScreenStateError> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::Composing { .. } => Err(ScreenStateError::Busy),
            Phase::Submitting { .. } => Err(ScreenStateError::SubmitInFlight),
        }
    }
}
