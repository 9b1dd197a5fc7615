//! Form state of a reading being composed or edited.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{GlucoseContext, Measurement, Unit, VitalKind, VitalReading};
use crate::vitals::descriptor::{convert, descriptor};
use crate::vitals::validation::{
    validate_blood_pressure, validate_field, validate_notes, ReadingField, ValidationError,
};

/// Raw, unvalidated inputs of one reading form.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    kind: VitalKind,
    inputs: BTreeMap<ReadingField, String>,
    unit: Unit,
    pub glucose_context: GlucoseContext,
    pub taken_at: DateTime<Utc>,
    pub notes: String,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReading {
    pub measurement: Measurement,
    pub unit: Unit,
    pub taken_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ReadingDraft {
    /// Blank form for `kind`, pre-filled with the kind's defaults.
    pub fn new(kind: VitalKind) -> Self {
        let desc = descriptor(kind);
        let inputs = desc
            .fields
            .iter()
            .map(|field| {
                let value = desc
                    .defaults
                    .iter()
                    .find(|(f, _)| f == field)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default();
                (*field, value)
            })
            .collect();
        Self {
            kind,
            inputs,
            unit: desc.default_unit,
            glucose_context: GlucoseContext::Fasting,
            taken_at: Utc::now(),
            notes: String::new(),
        }
    }

    /// Form pre-filled from a stored reading, for editing.
    pub fn from_reading(reading: &VitalReading) -> Self {
        let mut draft = Self::new(reading.kind());
        draft.unit = reading.unit();
        draft.taken_at = reading.timestamp();
        draft.notes = reading.notes().unwrap_or_default().to_string();
        match *reading.measurement() {
            Measurement::BloodPressure { systolic, diastolic, pulse } => {
                draft.set(ReadingField::Systolic, systolic.to_string());
                draft.set(ReadingField::Diastolic, diastolic.to_string());
                draft.set(ReadingField::Pulse, pulse.to_string());
            }
            Measurement::Glucose { level, context } => {
                draft.set(ReadingField::Glucose, level.to_string());
                draft.glucose_context = context;
            }
            Measurement::Temperature { degrees } => {
                draft.set(ReadingField::Temperature, degrees.to_string());
            }
            Measurement::HeartRate { bpm } => {
                draft.set(ReadingField::HeartRate, bpm.to_string());
            }
        }
        draft
    }

    pub fn kind(&self) -> VitalKind {
        self.kind
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn input(&self, field: ReadingField) -> &str {
        self.inputs.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Set a raw input. Fields the kind does not have are ignored.
    pub fn set(&mut self, field: ReadingField, value: impl Into<String>) {
        if let Some(slot) = self.inputs.get_mut(&field) {
            *slot = value.into();
        }
    }

    /// Switch the display unit, converting every input that currently parses.
    /// Inputs that do not parse are left as typed; validation reports them.
    pub fn switch_unit(&mut self, unit: Unit) -> Result<(), ValidationError> {
        if !descriptor(self.kind).accepts_unit(unit) {
            return Err(ValidationError::UnsupportedUnit { kind: self.kind, unit });
        }
        let from = self.unit;
        for raw in self.inputs.values_mut() {
            if let Some(converted) = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .and_then(|v| convert(v, from, unit))
            {
                *raw = format!("{converted:.1}");
            }
        }
        self.unit = unit;
        Ok(())
    }

    /// Validate every input and build the measurement.
    pub fn validate(&self) -> Result<ValidReading, ValidationError> {
        if !descriptor(self.kind).accepts_unit(self.unit) {
            return Err(ValidationError::UnsupportedUnit {
                kind: self.kind,
                unit: self.unit,
            });
        }
        let measurement = match self.kind {
            VitalKind::BloodPressure => {
                let (systolic, diastolic, pulse) = validate_blood_pressure(
                    self.input(ReadingField::Systolic),
                    self.input(ReadingField::Diastolic),
                    self.input(ReadingField::Pulse),
                )?;
                Measurement::BloodPressure { systolic, diastolic, pulse }
            }
            VitalKind::Glucose => Measurement::Glucose {
                level: validate_field(ReadingField::Glucose, self.input(ReadingField::Glucose))?,
                context: self.glucose_context,
            },
            VitalKind::Temperature => Measurement::Temperature {
                degrees: validate_field(
                    ReadingField::Temperature,
                    self.input(ReadingField::Temperature),
                )?,
            },
            VitalKind::HeartRate => Measurement::HeartRate {
                bpm: validate_field(ReadingField::HeartRate, self.input(ReadingField::HeartRate))?,
            },
        };
        let notes = validate_notes(Some(&self.notes))?;
        Ok(ValidReading {
            measurement,
            unit: self.unit,
            taken_at: self.taken_at,
            notes,
        })
    }
}
