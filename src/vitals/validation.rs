// Input validation for vital-sign readings.
// Applied to the raw form strings before classification and persistence.
// Never clamps or substitutes a default: a bad value is reported, not fixed.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::models::{Unit, VitalKind};

/// Maximum length of the free-text notes on a reading.
pub const MAX_NOTES_CHARS: usize = 500;

/// One numeric input of a reading form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingField {
    Systolic,
    Diastolic,
    Pulse,
    HeartRate,
    Temperature,
    Glucose,
}

impl ReadingField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Systolic => "Systolic",
            Self::Diastolic => "Diastolic",
            Self::Pulse => "Pulse",
            Self::HeartRate => "Heart rate",
            Self::Temperature => "Temperature",
            Self::Glucose => "Glucose level",
        }
    }
}

impl fmt::Display for ReadingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive accepted range for a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub field: ReadingField,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

impl FieldRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Hard reject ranges. Temperature and glucose have none: they are judged by
/// their status bands only.
pub const VALIDATION_RANGES: &[FieldRange] = &[
    FieldRange { field: ReadingField::Systolic, min: 90.0, max: 200.0, unit: "mmHg" },
    FieldRange { field: ReadingField::Diastolic, min: 40.0, max: 130.0, unit: "mmHg" },
    FieldRange { field: ReadingField::Pulse, min: 40.0, max: 200.0, unit: "bpm" },
    FieldRange { field: ReadingField::HeartRate, min: 40.0, max: 200.0, unit: "BPM" },
];

pub fn range_for(field: ReadingField) -> Option<&'static FieldRange> {
    VALIDATION_RANGES.iter().find(|r| r.field == field)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please enter a value for {field}")]
    Missing { field: ReadingField },

    #[error("{field} must be a number")]
    NotNumeric { field: ReadingField },

    #[error("{field} must be between {min} and {max} {unit} (got {value})")]
    OutOfRange {
        field: ReadingField,
        min: f64,
        max: f64,
        unit: &'static str,
        value: f64,
    },

    #[error("{field} must be greater than 0")]
    NotPositive { field: ReadingField },

    #[error("Systolic ({systolic}) must be greater than diastolic ({diastolic})")]
    SystolicNotAboveDiastolic { systolic: f64, diastolic: f64 },

    #[error("Unit {unit} cannot be used for {kind}")]
    UnsupportedUnit { kind: VitalKind, unit: Unit },

    #[error("Notes are limited to {max} characters (got {len})")]
    NotesTooLong { max: usize, len: usize },
}

impl ValidationError {
    /// The input the user has to correct, when there is a single one.
    pub fn field(&self) -> Option<ReadingField> {
        match self {
            Self::Missing { field }
            | Self::NotNumeric { field }
            | Self::OutOfRange { field, .. }
            | Self::NotPositive { field } => Some(*field),
            Self::SystolicNotAboveDiastolic { .. } => Some(ReadingField::Systolic),
            Self::UnsupportedUnit { .. } | Self::NotesTooLong { .. } => None,
        }
    }
}

/// Parse a raw form value. Empty, non-numeric and non-finite input fail.
pub fn parse_number(field: ReadingField, raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::NotNumeric { field }),
    }
}

/// Parse one field and check it against its range.
pub fn validate_field(field: ReadingField, raw: &str) -> Result<f64, ValidationError> {
    let value = parse_number(field, raw)?;
    check_range(field, value)?;
    Ok(value)
}

fn check_range(field: ReadingField, value: f64) -> Result<(), ValidationError> {
    if let Some(range) = range_for(field) {
        if !range.contains(value) {
            return Err(ValidationError::OutOfRange {
                field,
                min: range.min,
                max: range.max,
                unit: range.unit,
                value,
            });
        }
    }
    if field == ReadingField::Glucose && value <= 0.0 {
        return Err(ValidationError::NotPositive { field });
    }
    Ok(())
}

/// Validate a blood pressure triple: every field individually, then the
/// systolic-above-diastolic rule.
pub fn validate_blood_pressure(
    systolic: &str,
    diastolic: &str,
    pulse: &str,
) -> Result<(f64, f64, f64), ValidationError> {
    let s = validate_field(ReadingField::Systolic, systolic)?;
    let d = validate_field(ReadingField::Diastolic, diastolic)?;
    let p = validate_field(ReadingField::Pulse, pulse)?;
    if s <= d {
        return Err(ValidationError::SystolicNotAboveDiastolic {
            systolic: s,
            diastolic: d,
        });
    }
    Ok((s, d, p))
}

/// Blank notes are dropped; long notes are rejected.
pub fn validate_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(text) = notes.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = text.chars().count();
    if len > MAX_NOTES_CHARS {
        return Err(ValidationError::NotesTooLong {
            max: MAX_NOTES_CHARS,
            len,
        });
    }
    Ok(Some(text.to_string()))
}
