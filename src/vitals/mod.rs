//! Vital signs: validation, classification, per-kind descriptors, form
//! drafts and the reading log.

pub mod classify;
pub mod descriptor;
pub mod draft;
pub mod log;
pub mod validation;

pub use classify::{classify, Classification};
pub use descriptor::{descriptor, VitalDescriptor};
pub use draft::{ReadingDraft, ValidReading};
pub use log::{VitalError, VitalLog};
pub use validation::{ReadingField, ValidationError};
