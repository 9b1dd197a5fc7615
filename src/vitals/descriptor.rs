//! Per-kind type descriptors. One table drives every vital screen: which
//! inputs the form has, which units it accepts and where readings are stored.

use crate::models::{Collection, Unit, VitalKind};
use crate::vitals::classify::GLUCOSE_MGDL_PER_MMOL;
use crate::vitals::validation::ReadingField;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalDescriptor {
    pub kind: VitalKind,
    pub title: &'static str,
    pub collection: Collection,
    pub fields: &'static [ReadingField],
    pub units: &'static [Unit],
    pub default_unit: Unit,
    /// Pre-filled form values for a new reading.
    pub defaults: &'static [(ReadingField, &'static str)],
}

impl VitalDescriptor {
    pub fn accepts_unit(&self, unit: Unit) -> bool {
        self.units.contains(&unit)
    }
}

pub const DESCRIPTORS: [VitalDescriptor; 4] = [
    VitalDescriptor {
        kind: VitalKind::BloodPressure,
        title: "Blood Pressure",
        collection: Collection::BloodPressure,
        fields: &[ReadingField::Systolic, ReadingField::Diastolic, ReadingField::Pulse],
        units: &[Unit::MmHg],
        default_unit: Unit::MmHg,
        defaults: &[
            (ReadingField::Systolic, "120"),
            (ReadingField::Diastolic, "80"),
            (ReadingField::Pulse, "70"),
        ],
    },
    VitalDescriptor {
        kind: VitalKind::Glucose,
        title: "Blood Glucose",
        collection: Collection::BloodGlucose,
        fields: &[ReadingField::Glucose],
        units: &[Unit::MgPerDl, Unit::MmolPerL],
        default_unit: Unit::MgPerDl,
        defaults: &[],
    },
    VitalDescriptor {
        kind: VitalKind::Temperature,
        title: "Temperature",
        collection: Collection::Temperature,
        fields: &[ReadingField::Temperature],
        units: &[Unit::Fahrenheit, Unit::Celsius],
        default_unit: Unit::Fahrenheit,
        defaults: &[(ReadingField::Temperature, "98.6")],
    },
    VitalDescriptor {
        kind: VitalKind::HeartRate,
        title: "Heart Rate",
        collection: Collection::HeartRate,
        fields: &[ReadingField::HeartRate],
        units: &[Unit::Bpm],
        default_unit: Unit::Bpm,
        defaults: &[],
    },
];

pub fn descriptor(kind: VitalKind) -> &'static VitalDescriptor {
    match kind {
        VitalKind::BloodPressure => &DESCRIPTORS[0],
        VitalKind::Glucose => &DESCRIPTORS[1],
        VitalKind::Temperature => &DESCRIPTORS[2],
        VitalKind::HeartRate => &DESCRIPTORS[3],
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Convert a value between two units of the same quantity, rounded to one
/// decimal. Returns `None` when the units are unrelated.
pub fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    let converted = match (from, to) {
        _ if from == to => value,
        (Unit::Fahrenheit, Unit::Celsius) => (value - 32.0) * 5.0 / 9.0,
        (Unit::Celsius, Unit::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
        (Unit::MgPerDl, Unit::MmolPerL) => value / GLUCOSE_MGDL_PER_MMOL,
        (Unit::MmolPerL, Unit::MgPerDl) => value * GLUCOSE_MGDL_PER_MMOL,
        _ => return None,
    };
    Some(round1(converted))
}
