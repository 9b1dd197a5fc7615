use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{GlucoseContext, Unit, VitalKind};
use crate::vitals::classify::{classify, Classification};

/// Validated value(s) of one reading. The variant is the vital kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    BloodPressure {
        systolic: f64,
        diastolic: f64,
        pulse: f64,
    },
    #[serde(rename = "blood_glucose")]
    Glucose {
        level: f64,
        context: GlucoseContext,
    },
    Temperature {
        degrees: f64,
    },
    HeartRate {
        bpm: f64,
    },
}

impl Measurement {
    pub fn kind(&self) -> VitalKind {
        match self {
            Measurement::BloodPressure { .. } => VitalKind::BloodPressure,
            Measurement::Glucose { .. } => VitalKind::Glucose,
            Measurement::Temperature { .. } => VitalKind::Temperature,
            Measurement::HeartRate { .. } => VitalKind::HeartRate,
        }
    }
}

/// A single vital sign reading as persisted under
/// `users/{ownerId}/{collection}/{id}`.
///
/// Fields are private so the stored `classification` can only come from
/// [`VitalReading::new`] or [`VitalReading::set_measurement`], both of which
/// recompute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    owner_id: String,
    #[serde(flatten)]
    measurement: Measurement,
    unit: Unit,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    notes: Option<String>,
    classification: String,
}

impl VitalReading {
    pub fn new(
        owner_id: impl Into<String>,
        measurement: Measurement,
        unit: Unit,
        timestamp: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        let classification = classify(&measurement, unit).label().to_string();
        Self {
            owner_id: owner_id.into(),
            measurement,
            unit,
            timestamp,
            notes,
            classification,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn kind(&self) -> VitalKind {
        self.measurement.kind()
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Stored label, as written at persistence time.
    pub fn classification(&self) -> &str {
        &self.classification
    }

    /// Label recomputed from the current values.
    pub fn current_classification(&self) -> Classification {
        classify(&self.measurement, self.unit)
    }

    pub fn is_classification_current(&self) -> bool {
        self.classification == self.current_classification().label()
    }

    /// Replace value(s) and unit; the classification follows.
    pub fn set_measurement(&mut self, measurement: Measurement, unit: Unit) {
        self.measurement = measurement;
        self.unit = unit;
        self.classification = classify(&self.measurement, self.unit).label().to_string();
    }
}
